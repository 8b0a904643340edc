//! Repository interfaces for realms, providers, users and daemons.
//!
//! Persistence is an injected dependency. Every repository returns
//! `NotFound` from updates and deletes of absent records and `Conflict` on
//! uniqueness violations; lookups return `Option`.

use crate::daemon::Daemon;
use crate::error::AuthError;
use crate::provider::Provider;
use crate::realm::Realm;
use crate::user::User;
use async_trait::async_trait;
use realmgate_core::{DaemonId, ProviderId, RealmId, Result, UserId};

#[async_trait]
pub trait RealmRepository: Send + Sync {
    async fn list_realms(&self) -> Result<Vec<Realm>, AuthError>;
    async fn get_realm(&self, id: RealmId) -> Result<Option<Realm>, AuthError>;
    async fn get_realm_by_code(&self, code: &str) -> Result<Option<Realm>, AuthError>;
    /// Fails with `Conflict` if the code is taken.
    async fn create_realm(&self, realm: Realm) -> Result<Realm, AuthError>;
    async fn update_realm(&self, realm: Realm) -> Result<Realm, AuthError>;
    /// Deletes the realm together with everything it owns.
    async fn delete_realm(&self, id: RealmId) -> Result<(), AuthError>;
}

#[async_trait]
pub trait ProviderRepository: Send + Sync {
    async fn list_providers(&self, realm_id: RealmId) -> Result<Vec<Provider>, AuthError>;
    async fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>, AuthError>;
    async fn get_provider_by_code(
        &self,
        realm_id: RealmId,
        code: &str,
    ) -> Result<Option<Provider>, AuthError>;
    /// Fails with `Conflict` if the code is taken within the realm.
    async fn create_provider(&self, provider: Provider) -> Result<Provider, AuthError>;
    async fn update_provider(&self, provider: Provider) -> Result<Provider, AuthError>;
    async fn delete_provider(&self, id: ProviderId) -> Result<(), AuthError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list_users(&self, realm_id: RealmId) -> Result<Vec<User>, AuthError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, AuthError>;
    /// Finds the user an external identity is bound to.
    async fn get_user_by_bind_id(
        &self,
        realm_id: RealmId,
        bind_id: &str,
    ) -> Result<Option<User>, AuthError>;
    /// Fails with `Conflict` if the bind ID is taken within the realm.
    async fn create_user(&self, user: User) -> Result<User, AuthError>;
    async fn update_user(&self, user: User) -> Result<User, AuthError>;
    async fn delete_user(&self, id: UserId) -> Result<(), AuthError>;
}

#[async_trait]
pub trait DaemonRepository: Send + Sync {
    async fn list_daemons(&self, realm_id: RealmId) -> Result<Vec<Daemon>, AuthError>;
    async fn get_daemon(&self, id: DaemonId) -> Result<Option<Daemon>, AuthError>;
    /// Fails with `Conflict` if the code is taken within the realm.
    async fn create_daemon(&self, daemon: Daemon) -> Result<Daemon, AuthError>;
    async fn update_daemon(&self, daemon: Daemon) -> Result<Daemon, AuthError>;
    async fn delete_daemon(&self, id: DaemonId) -> Result<(), AuthError>;
}

/// Every repository, plus the provider lookup used to issue links.
#[async_trait]
pub trait Directory: RealmRepository + ProviderRepository + UserRepository + DaemonRepository {
    /// Resolves an enabled provider of an enabled realm by their codes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the realm or provider is missing or disabled.
    async fn lookup_provider(
        &self,
        realm_code: &str,
        provider_code: &str,
    ) -> Result<(Realm, Provider), AuthError> {
        let realm = self
            .get_realm_by_code(realm_code)
            .await?
            .filter(|realm| realm.enabled)
            .ok_or_else(|| AuthError::not_found("realm", realm_code))?;
        let provider = self
            .get_provider_by_code(realm.id, provider_code)
            .await?
            .filter(|provider| provider.enabled)
            .ok_or_else(|| AuthError::not_found("provider", provider_code))?;
        Ok((realm, provider))
    }
}

impl<T> Directory for T where
    T: RealmRepository + ProviderRepository + UserRepository + DaemonRepository
{
}
