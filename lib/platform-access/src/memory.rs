//! In-process directory backed by ordered maps.
//!
//! Records are kept in `BTreeMap`s keyed by their ULID, so listings come back
//! in creation order. The directory can be seeded from a JSON document.

use crate::daemon::Daemon;
use crate::directory::{DaemonRepository, ProviderRepository, RealmRepository, UserRepository};
use crate::error::AuthError;
use crate::provider::Provider;
use crate::realm::Realm;
use crate::user::User;
use async_trait::async_trait;
use realmgate_core::{DaemonId, ProviderId, RealmId, Result, UserId};
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type StateResult<T> = std::result::Result<T, AuthError>;

/// Initial directory contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub realms: Vec<Realm>,
    pub providers: Vec<Provider>,
    pub users: Vec<User>,
    pub daemons: Vec<Daemon>,
}

#[derive(Debug, Default)]
struct State {
    realms: BTreeMap<RealmId, Realm>,
    providers: BTreeMap<ProviderId, Provider>,
    users: BTreeMap<UserId, User>,
    daemons: BTreeMap<DaemonId, Daemon>,
}

impl State {
    fn require_realm(&self, realm_id: RealmId) -> StateResult<()> {
        if self.realms.contains_key(&realm_id) {
            Ok(())
        } else {
            Err(AuthError::not_found("realm", realm_id))
        }
    }

    fn put_realm(&mut self, realm: Realm, replace: bool) -> StateResult<Realm> {
        if replace != self.realms.contains_key(&realm.id) {
            return Err(if replace {
                AuthError::not_found("realm", realm.id)
            } else {
                AuthError::conflict(format!("realm '{}' already exists", realm.id))
            });
        }
        if self
            .realms
            .values()
            .any(|other| other.id != realm.id && other.code == realm.code)
        {
            return Err(AuthError::conflict(format!(
                "realm code '{}' is taken",
                realm.code
            )));
        }
        self.realms.insert(realm.id, realm.clone());
        Ok(realm)
    }

    fn put_provider(&mut self, provider: Provider, replace: bool) -> StateResult<Provider> {
        if replace != self.providers.contains_key(&provider.id) {
            return Err(if replace {
                AuthError::not_found("provider", provider.id)
            } else {
                AuthError::conflict(format!("provider '{}' already exists", provider.id))
            });
        }
        self.require_realm(provider.realm_id)?;
        if self.providers.values().any(|other| {
            other.id != provider.id
                && other.realm_id == provider.realm_id
                && other.code == provider.code
        }) {
            return Err(AuthError::conflict(format!(
                "provider code '{}' is taken",
                provider.code
            )));
        }
        self.providers.insert(provider.id, provider.clone());
        Ok(provider)
    }

    fn put_user(&mut self, user: User, replace: bool) -> StateResult<User> {
        if replace != self.users.contains_key(&user.id) {
            return Err(if replace {
                AuthError::not_found("user", user.id)
            } else {
                AuthError::conflict(format!("user '{}' already exists", user.id))
            });
        }
        self.require_realm(user.realm_id)?;
        if self.users.values().any(|other| {
            other.id != user.id && other.realm_id == user.realm_id && other.bind_id == user.bind_id
        }) {
            return Err(AuthError::conflict(format!(
                "bind id '{}' is taken",
                user.bind_id
            )));
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn put_daemon(&mut self, daemon: Daemon, replace: bool) -> StateResult<Daemon> {
        if replace != self.daemons.contains_key(&daemon.id) {
            return Err(if replace {
                AuthError::not_found("daemon", daemon.id)
            } else {
                AuthError::conflict(format!("daemon '{}' already exists", daemon.id))
            });
        }
        self.require_realm(daemon.realm_id)?;
        if self.daemons.values().any(|other| {
            other.id != daemon.id && other.realm_id == daemon.realm_id && other.code == daemon.code
        }) {
            return Err(AuthError::conflict(format!(
                "daemon code '{}' is taken",
                daemon.code
            )));
        }
        self.daemons.insert(daemon.id, daemon.clone());
        Ok(daemon)
    }
}

/// [`Directory`](crate::directory::Directory) held in memory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<State>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from seed data, applying the same checks as writes.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` on duplicates and `NotFound` for records naming an
    /// unknown realm.
    pub fn from_seed(seed: Seed) -> Result<Self, AuthError> {
        let mut state = State::default();
        for realm in seed.realms {
            state.put_realm(realm, false)?;
        }
        for provider in seed.providers {
            state.put_provider(provider, false)?;
        }
        for user in seed.users {
            state.put_user(user, false)?;
        }
        for daemon in seed.daemons {
            state.put_daemon(daemon, false)?;
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

#[async_trait]
impl RealmRepository for MemoryDirectory {
    async fn list_realms(&self) -> Result<Vec<Realm>, AuthError> {
        Ok(self.state.read().await.realms.values().cloned().collect())
    }

    async fn get_realm(&self, id: RealmId) -> Result<Option<Realm>, AuthError> {
        Ok(self.state.read().await.realms.get(&id).cloned())
    }

    async fn get_realm_by_code(&self, code: &str) -> Result<Option<Realm>, AuthError> {
        let state = self.state.read().await;
        Ok(state.realms.values().find(|r| r.code == code).cloned())
    }

    async fn create_realm(&self, realm: Realm) -> Result<Realm, AuthError> {
        Ok(self.state.write().await.put_realm(realm, false)?)
    }

    async fn update_realm(&self, realm: Realm) -> Result<Realm, AuthError> {
        Ok(self.state.write().await.put_realm(realm, true)?)
    }

    async fn delete_realm(&self, id: RealmId) -> Result<(), AuthError> {
        let mut state = self.state.write().await;
        if state.realms.remove(&id).is_none() {
            return Err(AuthError::not_found("realm", id).into());
        }
        state.providers.retain(|_, p| p.realm_id != id);
        state.users.retain(|_, u| u.realm_id != id);
        state.daemons.retain(|_, d| d.realm_id != id);
        Ok(())
    }
}

#[async_trait]
impl ProviderRepository for MemoryDirectory {
    async fn list_providers(&self, realm_id: RealmId) -> Result<Vec<Provider>, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .providers
            .values()
            .filter(|p| p.realm_id == realm_id)
            .cloned()
            .collect())
    }

    async fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>, AuthError> {
        Ok(self.state.read().await.providers.get(&id).cloned())
    }

    async fn get_provider_by_code(
        &self,
        realm_id: RealmId,
        code: &str,
    ) -> Result<Option<Provider>, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .providers
            .values()
            .find(|p| p.realm_id == realm_id && p.code == code)
            .cloned())
    }

    async fn create_provider(&self, provider: Provider) -> Result<Provider, AuthError> {
        Ok(self.state.write().await.put_provider(provider, false)?)
    }

    async fn update_provider(&self, provider: Provider) -> Result<Provider, AuthError> {
        Ok(self.state.write().await.put_provider(provider, true)?)
    }

    async fn delete_provider(&self, id: ProviderId) -> Result<(), AuthError> {
        match self.state.write().await.providers.remove(&id) {
            Some(_) => Ok(()),
            None => Err(AuthError::not_found("provider", id).into()),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryDirectory {
    async fn list_users(&self, realm_id: RealmId) -> Result<Vec<User>, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.realm_id == realm_id)
            .cloned()
            .collect())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, AuthError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_bind_id(
        &self,
        realm_id: RealmId,
        bind_id: &str,
    ) -> Result<Option<User>, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.realm_id == realm_id && u.bind_id == bind_id)
            .cloned())
    }

    async fn create_user(&self, user: User) -> Result<User, AuthError> {
        Ok(self.state.write().await.put_user(user, false)?)
    }

    async fn update_user(&self, user: User) -> Result<User, AuthError> {
        Ok(self.state.write().await.put_user(user, true)?)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), AuthError> {
        match self.state.write().await.users.remove(&id) {
            Some(_) => Ok(()),
            None => Err(AuthError::not_found("user", id).into()),
        }
    }
}

#[async_trait]
impl DaemonRepository for MemoryDirectory {
    async fn list_daemons(&self, realm_id: RealmId) -> Result<Vec<Daemon>, AuthError> {
        let state = self.state.read().await;
        Ok(state
            .daemons
            .values()
            .filter(|d| d.realm_id == realm_id)
            .cloned()
            .collect())
    }

    async fn get_daemon(&self, id: DaemonId) -> Result<Option<Daemon>, AuthError> {
        Ok(self.state.read().await.daemons.get(&id).cloned())
    }

    async fn create_daemon(&self, daemon: Daemon) -> Result<Daemon, AuthError> {
        Ok(self.state.write().await.put_daemon(daemon, false)?)
    }

    async fn update_daemon(&self, daemon: Daemon) -> Result<Daemon, AuthError> {
        Ok(self.state.write().await.put_daemon(daemon, true)?)
    }

    async fn delete_daemon(&self, id: DaemonId) -> Result<(), AuthError> {
        match self.state.write().await.daemons.remove(&id) {
            Some(_) => Ok(()),
            None => Err(AuthError::not_found("daemon", id).into()),
        }
    }
}
