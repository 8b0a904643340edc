//! Policy-guarded administration of realms, providers, users, daemons and
//! API keys.
//!
//! Every operation asks the policy engine first and only then touches the
//! directory, so a denied caller learns nothing about what exists. Records
//! addressed under the wrong realm are reported as `NotFound`.

use crate::api_key::{ApiKey, ApiKeyOwner};
use crate::daemon::Daemon;
use crate::directory::Directory;
use crate::error::AuthError;
use crate::provider::{Provider, ProviderEndpoints, ProviderType};
use crate::realm::Realm;
use crate::user::User;
use chrono::{DateTime, Utc};
use realmgate_authz::{Actor, Operation, Policy, ResourceKind, ResourceRef, SystemRole};
use realmgate_core::{ApiKeyId, DaemonId, IdGenerator, ProviderId, RealmId, Result, UserId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

fn enabled_by_default() -> bool {
    true
}

/// Realm fields accepted on create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct RealmDraft {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// Provider fields accepted on create and update.
///
/// On update a missing `client_secret` keeps the stored one.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDraft {
    #[serde(default)]
    pub realm_id: Option<RealmId>,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub code: String,
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub redirect_url: String,
    #[serde(default)]
    pub endpoints: Option<ProviderEndpoints>,
}

/// User fields accepted on create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDraft {
    #[serde(default)]
    pub realm_id: Option<RealmId>,
    pub bind_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: SystemRole,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// Daemon fields accepted on create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonDraft {
    #[serde(default)]
    pub realm_id: Option<RealmId>,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// API key fields accepted on create and update. The secret is never
/// client-supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyDraft {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn check_realm_unchanged(
    path_realm: RealmId,
    draft_realm: Option<RealmId>,
) -> std::result::Result<(), AuthError> {
    match draft_realm {
        Some(realm_id) if realm_id != path_realm => {
            Err(AuthError::bad_request("the realm of a record cannot change"))
        }
        _ => Ok(()),
    }
}

fn redacted(mut key: ApiKey) -> ApiKey {
    key.key.clear();
    key
}

/// A user or daemon whose API keys are being administered.
enum KeyHolder {
    User(User),
    Daemon(Daemon),
}

impl KeyHolder {
    fn keys(&self) -> &[ApiKey] {
        match self {
            Self::User(user) => &user.api_keys,
            Self::Daemon(daemon) => &daemon.api_keys,
        }
    }

    fn keys_mut(&mut self) -> &mut Vec<ApiKey> {
        match self {
            Self::User(user) => &mut user.api_keys,
            Self::Daemon(daemon) => &mut daemon.api_keys,
        }
    }
}

/// Administrative operations over the directory.
#[derive(Clone)]
pub struct AdminService {
    directory: Arc<dyn Directory>,
    policy: Policy,
    ids: Arc<dyn IdGenerator>,
}

impl AdminService {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, policy: Policy, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            directory,
            policy,
            ids,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn authorize(
        &self,
        actor: &Actor,
        operation: Operation,
        target: &ResourceRef,
    ) -> Result<(), AuthError> {
        self.policy
            .authorize(actor, operation, target)
            .map_err(AuthError::from)?;
        Ok(())
    }

    async fn require_realm(&self, realm_id: RealmId) -> Result<Realm, AuthError> {
        match self.directory.get_realm(realm_id).await? {
            Some(realm) => Ok(realm),
            None => Err(AuthError::not_found("realm", realm_id).into()),
        }
    }

    // Realms

    pub async fn list_realms(&self, actor: &Actor) -> Result<Vec<Realm>, AuthError> {
        self.authorize(actor, Operation::List, &ResourceRef::realms())?;
        self.directory.list_realms().await
    }

    pub async fn get_realm(&self, actor: &Actor, realm_id: RealmId) -> Result<Realm, AuthError> {
        self.authorize(actor, Operation::Get, &ResourceRef::realm(realm_id))?;
        self.require_realm(realm_id).await
    }

    #[instrument(skip(self, draft), fields(actor = %actor, code = %draft.code))]
    pub async fn create_realm(&self, actor: &Actor, draft: RealmDraft) -> Result<Realm, AuthError> {
        let realm = Realm {
            id: RealmId::new(),
            code: draft.code,
            name: draft.name,
            description: draft.description,
            enabled: draft.enabled,
        };
        self.authorize(actor, Operation::Create, &ResourceRef::realms())?;
        let realm = self.directory.create_realm(realm).await?;
        info!(realm_id = %realm.id, "realm created");
        Ok(realm)
    }

    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn update_realm(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        draft: RealmDraft,
    ) -> Result<Realm, AuthError> {
        self.authorize(actor, Operation::Update, &ResourceRef::realm(realm_id))?;
        let mut realm = self.require_realm(realm_id).await?;
        realm.code = draft.code;
        realm.name = draft.name;
        realm.description = draft.description;
        realm.enabled = draft.enabled;
        self.directory.update_realm(realm).await
    }

    /// Deletes a realm and everything it owns.
    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_realm(&self, actor: &Actor, realm_id: RealmId) -> Result<(), AuthError> {
        self.authorize(actor, Operation::Delete, &ResourceRef::realm(realm_id))?;
        self.directory.delete_realm(realm_id).await?;
        info!(%realm_id, "realm deleted");
        Ok(())
    }

    // Providers

    pub async fn list_providers(
        &self,
        actor: &Actor,
        realm_id: RealmId,
    ) -> Result<Vec<Provider>, AuthError> {
        let target = ResourceRef::collection(ResourceKind::Provider, realm_id);
        self.authorize(actor, Operation::List, &target)?;
        self.require_realm(realm_id).await?;
        self.directory.list_providers(realm_id).await
    }

    pub async fn get_provider(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        provider_id: ProviderId,
    ) -> Result<Provider, AuthError> {
        let target =
            ResourceRef::instance(ResourceKind::Provider, realm_id, provider_id.to_string());
        self.authorize(actor, Operation::Get, &target)?;
        self.find_provider(realm_id, provider_id).await
    }

    async fn find_provider(
        &self,
        realm_id: RealmId,
        provider_id: ProviderId,
    ) -> Result<Provider, AuthError> {
        match self.directory.get_provider(provider_id).await? {
            Some(provider) if provider.realm_id == realm_id => Ok(provider),
            _ => Err(AuthError::not_found("provider", provider_id).into()),
        }
    }

    #[instrument(skip(self, draft), fields(actor = %actor, code = %draft.code))]
    pub async fn create_provider(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        draft: ProviderDraft,
    ) -> Result<Provider, AuthError> {
        let target = ResourceRef::collection(ResourceKind::Provider, realm_id);
        self.authorize(actor, Operation::Create, &target)?;
        check_realm_unchanged(realm_id, draft.realm_id)?;
        self.require_realm(realm_id).await?;

        let provider = Provider {
            id: ProviderId::new(),
            realm_id,
            provider_type: draft.provider_type,
            code: draft.code,
            name: draft.name,
            enabled: draft.enabled,
            client_id: draft.client_id,
            client_secret: draft.client_secret.unwrap_or_default(),
            redirect_url: draft.redirect_url,
            endpoints: draft.endpoints,
        };
        provider.endpoints()?;
        let provider = self.directory.create_provider(provider).await?;
        info!(provider_id = %provider.id, "provider created");
        Ok(provider)
    }

    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn update_provider(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        provider_id: ProviderId,
        draft: ProviderDraft,
    ) -> Result<Provider, AuthError> {
        let target =
            ResourceRef::instance(ResourceKind::Provider, realm_id, provider_id.to_string());
        self.authorize(actor, Operation::Update, &target)?;
        check_realm_unchanged(realm_id, draft.realm_id)?;

        let mut provider = self.find_provider(realm_id, provider_id).await?;
        provider.provider_type = draft.provider_type;
        provider.code = draft.code;
        provider.name = draft.name;
        provider.enabled = draft.enabled;
        provider.client_id = draft.client_id;
        if let Some(secret) = draft.client_secret {
            provider.client_secret = secret;
        }
        provider.redirect_url = draft.redirect_url;
        provider.endpoints = draft.endpoints;
        provider.endpoints()?;
        self.directory.update_provider(provider).await
    }

    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_provider(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        provider_id: ProviderId,
    ) -> Result<(), AuthError> {
        let target =
            ResourceRef::instance(ResourceKind::Provider, realm_id, provider_id.to_string());
        self.authorize(actor, Operation::Delete, &target)?;
        self.find_provider(realm_id, provider_id).await?;
        self.directory.delete_provider(provider_id).await
    }

    // Users

    pub async fn list_users(
        &self,
        actor: &Actor,
        realm_id: RealmId,
    ) -> Result<Vec<User>, AuthError> {
        let target = ResourceRef::collection(ResourceKind::User, realm_id);
        self.authorize(actor, Operation::List, &target)?;
        self.require_realm(realm_id).await?;
        let users = self.directory.list_users(realm_id).await?;
        Ok(users.into_iter().map(redact_user_keys).collect())
    }

    pub async fn get_user(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        user_id: UserId,
    ) -> Result<User, AuthError> {
        self.authorize(actor, Operation::Get, &ResourceRef::user(realm_id, user_id))?;
        self.find_user(realm_id, user_id).await.map(redact_user_keys)
    }

    async fn find_user(&self, realm_id: RealmId, user_id: UserId) -> Result<User, AuthError> {
        match self.directory.get_user(user_id).await? {
            Some(user) if user.realm_id == realm_id => Ok(user),
            _ => Err(AuthError::not_found("user", user_id).into()),
        }
    }

    fn check_role_grant(actor: &Actor, role: SystemRole) -> std::result::Result<(), AuthError> {
        if role > actor.role {
            return Err(AuthError::access_denied(format!(
                "{} may not grant the {role} role",
                actor.role
            )));
        }
        Ok(())
    }

    /// Users outranking the actor are out of its reach.
    fn check_target_rank(actor: &Actor, user: &User) -> std::result::Result<(), AuthError> {
        if user.role > actor.role {
            return Err(AuthError::access_denied(format!(
                "{} may not modify a user with the {} role",
                actor.role, user.role
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn create_user(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        draft: UserDraft,
    ) -> Result<User, AuthError> {
        let target = ResourceRef::collection(ResourceKind::User, realm_id);
        self.authorize(actor, Operation::Create, &target)?;
        check_realm_unchanged(realm_id, draft.realm_id)?;
        Self::check_role_grant(actor, draft.role)?;
        self.require_realm(realm_id).await?;

        let mut user = User::new(realm_id, draft.bind_id, draft.role);
        user.name = draft.name;
        user.enabled = draft.enabled;
        let user = self.directory.create_user(user).await?;
        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Updates a user.
    ///
    /// A `User` updating itself may change only its name.
    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn update_user(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        user_id: UserId,
        draft: UserDraft,
    ) -> Result<User, AuthError> {
        self.authorize(actor, Operation::Update, &ResourceRef::user(realm_id, user_id))?;
        check_realm_unchanged(realm_id, draft.realm_id)?;
        let mut user = self.find_user(realm_id, user_id).await?;
        Self::check_target_rank(actor, &user)?;

        if actor.role == SystemRole::User
            && (draft.role != user.role
                || draft.enabled != user.enabled
                || draft.bind_id != user.bind_id)
        {
            return Err(AuthError::access_denied("users may only change their own name").into());
        }
        if draft.role != user.role {
            Self::check_role_grant(actor, draft.role)?;
        }

        user.bind_id = draft.bind_id;
        user.name = draft.name;
        user.role = draft.role;
        user.enabled = draft.enabled;
        user.touch();
        self.directory.update_user(user).await.map(redact_user_keys)
    }

    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_user(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        user_id: UserId,
    ) -> Result<(), AuthError> {
        self.authorize(actor, Operation::Delete, &ResourceRef::user(realm_id, user_id))?;
        let user = self.find_user(realm_id, user_id).await?;
        Self::check_target_rank(actor, &user)?;
        self.directory.delete_user(user_id).await
    }

    // Daemons

    pub async fn list_daemons(
        &self,
        actor: &Actor,
        realm_id: RealmId,
    ) -> Result<Vec<Daemon>, AuthError> {
        let target = ResourceRef::collection(ResourceKind::Daemon, realm_id);
        self.authorize(actor, Operation::List, &target)?;
        self.require_realm(realm_id).await?;
        let daemons = self.directory.list_daemons(realm_id).await?;
        Ok(daemons.into_iter().map(redact_daemon_keys).collect())
    }

    pub async fn get_daemon(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        daemon_id: DaemonId,
    ) -> Result<Daemon, AuthError> {
        let target = ResourceRef::instance(ResourceKind::Daemon, realm_id, daemon_id.to_string());
        self.authorize(actor, Operation::Get, &target)?;
        self.find_daemon(realm_id, daemon_id).await.map(redact_daemon_keys)
    }

    async fn find_daemon(
        &self,
        realm_id: RealmId,
        daemon_id: DaemonId,
    ) -> Result<Daemon, AuthError> {
        match self.directory.get_daemon(daemon_id).await? {
            Some(daemon) if daemon.realm_id == realm_id => Ok(daemon),
            _ => Err(AuthError::not_found("daemon", daemon_id).into()),
        }
    }

    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn create_daemon(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        draft: DaemonDraft,
    ) -> Result<Daemon, AuthError> {
        let target = ResourceRef::collection(ResourceKind::Daemon, realm_id);
        self.authorize(actor, Operation::Create, &target)?;
        check_realm_unchanged(realm_id, draft.realm_id)?;
        self.require_realm(realm_id).await?;

        let mut daemon = Daemon::new(realm_id, draft.code);
        daemon.name = draft.name;
        daemon.enabled = draft.enabled;
        let daemon = self.directory.create_daemon(daemon).await?;
        info!(daemon_id = %daemon.id, "daemon created");
        Ok(daemon)
    }

    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn update_daemon(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        daemon_id: DaemonId,
        draft: DaemonDraft,
    ) -> Result<Daemon, AuthError> {
        let target = ResourceRef::instance(ResourceKind::Daemon, realm_id, daemon_id.to_string());
        self.authorize(actor, Operation::Update, &target)?;
        check_realm_unchanged(realm_id, draft.realm_id)?;

        let mut daemon = self.find_daemon(realm_id, daemon_id).await?;
        daemon.code = draft.code;
        daemon.name = draft.name;
        daemon.enabled = draft.enabled;
        self.directory.update_daemon(daemon).await.map(redact_daemon_keys)
    }

    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_daemon(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        daemon_id: DaemonId,
    ) -> Result<(), AuthError> {
        let target = ResourceRef::instance(ResourceKind::Daemon, realm_id, daemon_id.to_string());
        self.authorize(actor, Operation::Delete, &target)?;
        self.find_daemon(realm_id, daemon_id).await?;
        self.directory.delete_daemon(daemon_id).await
    }

    // API keys

    fn key_target(realm_id: RealmId, key_id: Option<ApiKeyId>) -> ResourceRef {
        match key_id {
            Some(key_id) => {
                ResourceRef::instance(ResourceKind::ApiKey, realm_id, key_id.to_string())
            }
            None => ResourceRef::collection(ResourceKind::ApiKey, realm_id),
        }
    }

    async fn key_holder(
        &self,
        realm_id: RealmId,
        owner: ApiKeyOwner,
    ) -> Result<KeyHolder, AuthError> {
        match owner {
            ApiKeyOwner::User(user_id) => {
                self.find_user(realm_id, user_id).await.map(KeyHolder::User)
            }
            ApiKeyOwner::Daemon(daemon_id) => {
                self.find_daemon(realm_id, daemon_id).await.map(KeyHolder::Daemon)
            }
        }
    }

    /// Loads a key holder whose keys the actor is about to change.
    async fn key_holder_mut(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        owner: ApiKeyOwner,
    ) -> Result<KeyHolder, AuthError> {
        let holder = self.key_holder(realm_id, owner).await?;
        if let KeyHolder::User(user) = &holder {
            Self::check_target_rank(actor, user)?;
        }
        Ok(holder)
    }

    async fn save_key_holder(&self, holder: KeyHolder) -> Result<(), AuthError> {
        match holder {
            KeyHolder::User(mut user) => {
                user.touch();
                self.directory.update_user(user).await?;
            }
            KeyHolder::Daemon(daemon) => {
                self.directory.update_daemon(daemon).await?;
            }
        }
        Ok(())
    }

    /// Lists the keys of a user or daemon with their secrets blanked.
    pub async fn list_api_keys(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        owner: ApiKeyOwner,
    ) -> Result<Vec<ApiKey>, AuthError> {
        self.authorize(actor, Operation::List, &Self::key_target(realm_id, None))?;
        let holder = self.key_holder(realm_id, owner).await?;
        Ok(holder.keys().iter().cloned().map(redacted).collect())
    }

    pub async fn get_api_key(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        owner: ApiKeyOwner,
        key_id: ApiKeyId,
    ) -> Result<ApiKey, AuthError> {
        self.authorize(actor, Operation::Get, &Self::key_target(realm_id, Some(key_id)))?;
        let holder = self.key_holder(realm_id, owner).await?;
        holder
            .keys()
            .iter()
            .find(|key| key.id == key_id)
            .cloned()
            .map(redacted)
            .ok_or_else(|| AuthError::not_found("api key", key_id).into())
    }

    /// Creates a key with a server-generated secret.
    ///
    /// The returned key is the only place the secret is ever shown.
    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn create_api_key(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        owner: ApiKeyOwner,
        draft: ApiKeyDraft,
    ) -> Result<ApiKey, AuthError> {
        self.authorize(actor, Operation::Create, &Self::key_target(realm_id, None))?;
        let mut holder = self.key_holder_mut(actor, realm_id, owner).await?;

        let secret = self.ids.generate_id().map_err(AuthError::store)?;
        let mut key = ApiKey::new(draft.name, secret);
        key.enabled = draft.enabled;
        key.expires_at = draft.expires_at;
        holder.keys_mut().push(key.clone());
        self.save_key_holder(holder).await?;

        info!(key_id = %key.id, "api key created");
        Ok(key)
    }

    /// Renames, enables or disables a key, or changes its expiry.
    #[instrument(skip(self, draft), fields(actor = %actor))]
    pub async fn update_api_key(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        owner: ApiKeyOwner,
        key_id: ApiKeyId,
        draft: ApiKeyDraft,
    ) -> Result<ApiKey, AuthError> {
        self.authorize(actor, Operation::Update, &Self::key_target(realm_id, Some(key_id)))?;
        let mut holder = self.key_holder_mut(actor, realm_id, owner).await?;

        let Some(key) = holder.keys_mut().iter_mut().find(|key| key.id == key_id) else {
            return Err(AuthError::not_found("api key", key_id).into());
        };
        key.name = draft.name;
        key.enabled = draft.enabled;
        key.expires_at = draft.expires_at;
        let updated = redacted(key.clone());
        self.save_key_holder(holder).await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(actor = %actor))]
    pub async fn delete_api_key(
        &self,
        actor: &Actor,
        realm_id: RealmId,
        owner: ApiKeyOwner,
        key_id: ApiKeyId,
    ) -> Result<(), AuthError> {
        self.authorize(actor, Operation::Delete, &Self::key_target(realm_id, Some(key_id)))?;
        let mut holder = self.key_holder_mut(actor, realm_id, owner).await?;

        let keys = holder.keys_mut();
        let before = keys.len();
        keys.retain(|key| key.id != key_id);
        if keys.len() == before {
            return Err(AuthError::not_found("api key", key_id).into());
        }
        self.save_key_holder(holder).await
    }
}

fn redact_user_keys(mut user: User) -> User {
    user.api_keys = user.api_keys.into_iter().map(redacted).collect();
    user
}

fn redact_daemon_keys(mut daemon: Daemon) -> Daemon {
    daemon.api_keys = daemon.api_keys.into_iter().map(redacted).collect();
    daemon
}
