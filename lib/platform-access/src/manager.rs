//! OAuth2 session lifecycle.
//!
//! ```text
//! NoSession --provider_link--> Pending --login--> Active --refresh--> Active
//!                                 |                  |
//!                                 +--(failure)--+    +--logout--> NoSession
//!                                               v
//!                                           NoSession
//! ```
//!
//! Failures are surfaced, never retried. Any failure after the state has been
//! validated discards the pending session; that cleanup is best-effort and
//! its own failure is only logged.

use crate::api_key::{ApiKeyResolver, ResolvedApiKey};
use crate::cache::SessionStore;
use crate::cookie::UserSession;
use crate::directory::Directory;
use crate::error::AuthError;
use crate::gateway::OAuthGateway;
use crate::session::{LinkAction, Session, SessionId};
use chrono::Utc;
use realmgate_core::{IdGenerator, RealmId, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const INVALID_STATE: &str = "invalid state parameter";

/// A provider authorization link and the session it opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLink {
    pub url: String,
    /// The pending session, also sent to the provider as `state`.
    pub session_id: SessionId,
}

/// Orchestrates provider links, logins, refreshes and logouts.
#[derive(Clone)]
pub struct SessionManager {
    directory: Arc<dyn Directory>,
    store: SessionStore,
    gateway: Arc<dyn OAuthGateway>,
    ids: Arc<dyn IdGenerator>,
    api_keys: ApiKeyResolver,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        store: SessionStore,
        gateway: Arc<dyn OAuthGateway>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            api_keys: ApiKeyResolver::new(directory.clone()),
            directory,
            store,
            gateway,
            ids,
        }
    }

    /// Returns the underlying session store.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Issues an authorization link for an enabled provider of an enabled realm
    /// and records a pending session under a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the realm or provider is missing or disabled.
    #[instrument(skip(self))]
    pub async fn provider_link(
        &self,
        realm_code: &str,
        provider_code: &str,
        action: LinkAction,
    ) -> Result<ProviderLink, AuthError> {
        let (_realm, provider) = self
            .directory
            .lookup_provider(realm_code, provider_code)
            .await?;

        let session_id = SessionId::new(self.ids.generate_id().map_err(AuthError::store)?);
        let request = self
            .gateway
            .authorization_request(&provider, session_id.as_str(), action)?;

        let session = Session::pending(provider, action, request.pkce_verifier);
        self.store.save(&session_id, &session).await?;

        debug!(%session_id, "pending session created");
        Ok(ProviderLink {
            url: request.url,
            session_id,
        })
    }

    /// Completes a login: exchanges `code` for the pending session `state`,
    /// resolves the local user and activates the session.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `code` or `state` is empty
    /// - `AccessDenied` if `state` names no pending session, or the identity
    ///   is not bound to an enabled user
    /// - the gateway's error if the exchange or user-info call fails
    #[instrument(skip(self, code))]
    pub async fn login(&self, code: &str, state: &str) -> Result<UserSession, AuthError> {
        if code.is_empty() || state.is_empty() {
            return Err(AuthError::bad_request("code and state are required").into());
        }

        let session_id = SessionId::from(state);
        let Some(session) = self.store.load(&session_id).await? else {
            return Err(AuthError::access_denied(INVALID_STATE).into());
        };
        if session.is_active() {
            return Err(AuthError::access_denied(INVALID_STATE).into());
        }

        match self.activate(&session_id, session, code).await {
            Ok(user_session) => {
                info!(%session_id, user_id = ?user_session.user_id, "login completed");
                Ok(user_session)
            }
            Err(err) => {
                self.discard(&session_id).await;
                Err(err)
            }
        }
    }

    async fn activate(
        &self,
        session_id: &SessionId,
        mut session: Session,
        code: &str,
    ) -> Result<UserSession, AuthError> {
        let provider = &session.provider;
        let token = self
            .gateway
            .exchange_code(provider, code, session.pkce_verifier.as_deref())
            .await?;
        let identity = self.gateway.user_info(provider, &token).await?;

        let user = self
            .directory
            .get_user_by_bind_id(session.realm_id, identity.bind_id())
            .await?
            .ok_or_else(|| {
                AuthError::access_denied(format!("no user is bound to '{}'", identity.bind_id()))
            })?;
        if !user.enabled {
            return Err(AuthError::access_denied(format!("user {} is disabled", user.id)).into());
        }

        session.activate(token, user.id);
        self.store.save(session_id, &session).await?;

        Ok(UserSession::new(
            session_id.clone(),
            session.realm_id,
            user.id,
            user.role,
        ))
    }

    async fn discard(&self, session_id: &SessionId) {
        if let Err(err) = self.store.remove(session_id).await {
            warn!(%session_id, error = %err, "failed to discard session");
        }
    }

    /// Refreshes the session's access token if it is no longer fresh.
    ///
    /// Returns `false` without calling the provider while the token is fresh.
    ///
    /// # Errors
    ///
    /// - `AccessDenied` if the session does not exist or is still pending
    /// - `Session` if the token expired and there is no refresh token
    /// - the gateway's error if the refresh fails
    #[instrument(skip(self))]
    pub async fn refresh(&self, session_id: &SessionId) -> Result<bool, AuthError> {
        let Some(mut session) = self.store.load(session_id).await? else {
            return Err(AuthError::access_denied("session not found").into());
        };
        let Some(token) = &session.token else {
            return Err(AuthError::access_denied("session is not active").into());
        };
        if token.is_fresh(Utc::now()) {
            return Ok(false);
        }
        let Some(refresh_token) = token.refresh_token.clone() else {
            return Err(
                AuthError::session("access token expired and no refresh token is held").into(),
            );
        };

        let token = self
            .gateway
            .refresh_token(&session.provider, &refresh_token)
            .await?;
        session.refresh(token);
        self.store.save(session_id, &session).await?;

        debug!(%session_id, "session refreshed");
        Ok(true)
    }

    /// Checks a decoded cookie against its cached session and the directory,
    /// then refreshes the session.
    ///
    /// The returned descriptor carries the user's current role, not the one
    /// the cookie claims. The flag reports whether the token was refreshed.
    ///
    /// # Errors
    ///
    /// - `AccessDenied` if the session does not exist, is still pending, is
    ///   bound to another user or realm, or its user is gone or disabled
    /// - any error of [`SessionManager::refresh`]
    #[instrument(skip(self, cookie), fields(session_id = %cookie.session_id))]
    pub async fn authenticate(
        &self,
        cookie: &UserSession,
    ) -> Result<(UserSession, bool), AuthError> {
        let Some(session) = self.store.load(&cookie.session_id).await? else {
            return Err(AuthError::access_denied("session not found").into());
        };
        let Some(user_id) = session.user_id else {
            return Err(AuthError::access_denied("session is not active").into());
        };
        if cookie.user_id != Some(user_id) || cookie.realm_id != Some(session.realm_id) {
            warn!("session cookie does not match its session");
            return Err(AuthError::access_denied("cookie does not match its session").into());
        }

        let user = self
            .directory
            .get_user(user_id)
            .await?
            .filter(|user| user.enabled && user.realm_id == session.realm_id)
            .ok_or_else(|| {
                AuthError::access_denied(format!("user {user_id} is not active"))
            })?;

        let refreshed = self.refresh(&cookie.session_id).await?;
        let verified = UserSession::new(
            cookie.session_id.clone(),
            session.realm_id,
            user.id,
            user.role,
        );
        Ok((verified, refreshed))
    }

    /// Deletes the session and revokes its token at the provider.
    ///
    /// The local session is removed before revocation, so a revoke failure
    /// still leaves the caller logged out.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` if the session does not exist, or the gateway's
    /// error if revocation fails.
    #[instrument(skip(self))]
    pub async fn logout(&self, session_id: &SessionId) -> Result<(), AuthError> {
        let Some(session) = self.store.load(session_id).await? else {
            return Err(AuthError::access_denied("session not found").into());
        };
        self.store.remove(session_id).await?;

        if let Some(token) = &session.token {
            self.gateway.revoke_token(&session.provider, token).await?;
        }
        info!(%session_id, "logged out");
        Ok(())
    }

    /// Resolves an API key presented for a realm.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if no enabled, unexpired key matches.
    #[instrument(skip(self, key))]
    pub async fn verify_api_key(
        &self,
        realm_id: RealmId,
        key: &str,
    ) -> Result<ResolvedApiKey, AuthError> {
        match self.api_keys.find(realm_id, key).await? {
            Some(resolved) => Ok(resolved),
            None => Err(AuthError::unauthorized("api key not recognized").into()),
        }
    }
}
