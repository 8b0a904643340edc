//! API keys and their resolution.
//!
//! Non-interactive callers present `Authorization: Bearer base64(realmID:key)`.
//! The resolver scans the enabled users of the realm, then its enabled
//! daemons, for an enabled, unexpired key with the presented secret. The
//! first match wins; uniqueness of secrets is not enforced on write.

use crate::directory::Directory;
use crate::error::AuthError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use realmgate_core::{ApiKeyId, DaemonId, RealmId, Result, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A static credential attached to a user or daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub name: String,
    pub enabled: bool,
    /// The secret value presented by callers.
    pub key: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Creates an enabled key with no expiry.
    #[must_use]
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: ApiKeyId::new(),
            name: name.into(),
            enabled: true,
            key: key.into(),
            expires_at: None,
        }
    }

    /// Returns true if the key is enabled and not expired at `now`.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    fn matches(&self, secret: &str, now: DateTime<Utc>) -> bool {
        self.is_usable(now) && self.key == secret
    }
}

/// The principal a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ApiKeyOwner {
    User(UserId),
    Daemon(DaemonId),
}

/// A key that resolved, with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedApiKey {
    pub realm_id: RealmId,
    pub owner: ApiKeyOwner,
    pub key: ApiKey,
}

/// Credentials carried by a bearer `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCredentials {
    pub realm_id: RealmId,
    pub key: String,
}

impl BearerCredentials {
    /// Parses `Bearer base64(realmID:key)`.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when the scheme, encoding or content is malformed.
    pub fn parse_authorization(header: &str) -> std::result::Result<Self, AuthError> {
        let (scheme, token) = header
            .trim()
            .split_once(' ')
            .ok_or_else(|| AuthError::bad_request("malformed authorization header"))?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::bad_request("authorization scheme must be Bearer"));
        }

        let decoded = STANDARD
            .decode(token.trim())
            .map_err(|_| AuthError::bad_request("bearer token is not valid base64"))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::bad_request("bearer token is not valid UTF-8"))?;

        let (realm_id, key) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::bad_request("bearer token must be realmID:key"))?;
        let realm_id = realm_id
            .parse::<RealmId>()
            .map_err(|e| AuthError::bad_request(e.to_string()))?;
        if key.is_empty() {
            return Err(AuthError::bad_request("bearer token has an empty key"));
        }

        Ok(Self {
            realm_id,
            key: key.to_string(),
        })
    }

    /// Encodes the credentials as an `Authorization` header value.
    #[must_use]
    pub fn to_authorization(&self) -> String {
        format!(
            "Bearer {}",
            STANDARD.encode(format!("{}:{}", self.realm_id, self.key))
        )
    }
}

/// Read-only API key lookup over the directory.
#[derive(Clone)]
pub struct ApiKeyResolver {
    directory: Arc<dyn Directory>,
}

impl ApiKeyResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Finds the first usable key with the given secret in the realm.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn find(
        &self,
        realm_id: RealmId,
        secret: &str,
    ) -> Result<Option<ResolvedApiKey>, AuthError> {
        if secret.is_empty() {
            return Ok(None);
        }
        let now = Utc::now();

        for user in self.directory.list_users(realm_id).await? {
            if !user.enabled {
                continue;
            }
            if let Some(key) = user.api_keys.iter().find(|k| k.matches(secret, now)) {
                debug!(%realm_id, user_id = %user.id, key_id = %key.id, "api key resolved to user");
                return Ok(Some(ResolvedApiKey {
                    realm_id,
                    owner: ApiKeyOwner::User(user.id),
                    key: key.clone(),
                }));
            }
        }

        for daemon in self.directory.list_daemons(realm_id).await? {
            if !daemon.enabled {
                continue;
            }
            if let Some(key) = daemon.api_keys.iter().find(|k| k.matches(secret, now)) {
                debug!(
                    %realm_id,
                    daemon_id = %daemon.id,
                    key_id = %key.id,
                    "api key resolved to daemon"
                );
                return Ok(Some(ResolvedApiKey {
                    realm_id,
                    owner: ApiKeyOwner::Daemon(daemon.id),
                    key: key.clone(),
                }));
            }
        }

        Ok(None)
    }

    /// Like [`find`](Self::find), but a missing key is `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no usable key matches.
    pub async fn lookup(
        &self,
        realm_id: RealmId,
        secret: &str,
    ) -> Result<ResolvedApiKey, AuthError> {
        match self.find(realm_id, secret).await? {
            Some(resolved) => Ok(resolved),
            None => Err(AuthError::not_found("api key", realm_id).into()),
        }
    }
}
