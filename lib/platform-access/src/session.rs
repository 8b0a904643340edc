//! OAuth2 session records kept in the session cache.
//!
//! A session is created *pending* when a provider link is issued: it carries
//! the realm, the provider configuration and the PKCE verifier, keyed by the
//! session ID that doubles as the OAuth2 `state`. It becomes *active* once the
//! authorization code is exchanged for a token, and is refreshed in place.

use crate::error::AuthError;
use crate::provider::Provider;
use chrono::{DateTime, Duration, Utc};
use realmgate_core::{RealmId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a session.
///
/// Session IDs are opaque strings produced by the ID generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session ID from a string.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a provider link is issued for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkAction {
    /// Plain sign-in.
    #[default]
    Login,
    /// Forces the provider consent screen so a refresh token is re-issued.
    Consent,
}

impl LinkAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Consent => "consent",
        }
    }
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkAction {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "login" => Ok(Self::Login),
            "consent" => Ok(Self::Consent),
            other => Err(AuthError::bad_request(format!("unknown link action '{other}'"))),
        }
    }
}

/// Tokens returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires; `None` when the provider did not say.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Tokens this many seconds from expiry are treated as expired.
    pub const EXPIRY_LEEWAY_SECONDS: i64 = 10;

    /// Returns true if the access token is still usable at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_none_or(|expires_at| {
                expires_at - Duration::seconds(Self::EXPIRY_LEEWAY_SECONDS) > now
            })
    }
}

/// A pending or active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub realm_id: RealmId,
    /// Provider configuration captured when the link was issued.
    pub provider: Provider,
    #[serde(default)]
    pub action: LinkAction,
    #[serde(default)]
    pub pkce_verifier: Option<String>,
    /// Present once the session is active.
    #[serde(default)]
    pub token: Option<OAuthToken>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// When the session was last written.
    pub timestamp: DateTime<Utc>,
}

impl Session {
    /// Creates a pending session for a freshly issued provider link.
    #[must_use]
    pub fn pending(provider: Provider, action: LinkAction, pkce_verifier: Option<String>) -> Self {
        Self {
            realm_id: provider.realm_id,
            provider,
            action,
            pkce_verifier,
            token: None,
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Returns true once a token has been obtained.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    /// Activates the session after a successful code exchange.
    ///
    /// The PKCE verifier is single-use and dropped here.
    pub fn activate(&mut self, token: OAuthToken, user_id: UserId) {
        self.token = Some(token);
        self.user_id = Some(user_id);
        self.pkce_verifier = None;
        self.timestamp = Utc::now();
    }

    /// Replaces the token after a refresh.
    ///
    /// Providers may omit the refresh token on refresh; the previous one is kept then.
    pub fn refresh(&mut self, mut token: OAuthToken) {
        if token.refresh_token.is_none() {
            token.refresh_token = self.token.as_ref().and_then(|t| t.refresh_token.clone());
        }
        self.token = Some(token);
        self.timestamp = Utc::now();
    }
}
