//! Error types for the platform-access crate.
//!
//! Every fallible operation reports an [`AuthError`] through
//! `rootcause::Report`. The variants mirror the kinds the HTTP layer maps to
//! status codes; [`AuthError::kind`] exposes that mapping without the payload.

use realmgate_authz::AccessDenied;
use std::fmt;

/// Coarse classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    AccessDenied,
    NotFound,
    Session,
    Unauthorized,
    Store,
    Gateway,
    Conflict,
}

/// Errors from authentication, session and administration operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed input: missing codes, malformed bearer token, invalid payload.
    BadRequest { reason: String },
    /// Policy denial, stale or forged OAuth2 state, missing session.
    AccessDenied { reason: String },
    /// Unknown realm, provider, principal or API key.
    NotFound { resource: &'static str, key: String },
    /// Session cookie could not be verified or the session could not be refreshed.
    Session { reason: String },
    /// Presented API key does not resolve.
    Unauthorized { reason: String },
    /// Repository or cache failure.
    Store { details: String },
    /// OAuth2 provider failure.
    Gateway { provider: String, details: String },
    /// Uniqueness violation on write.
    Conflict { details: String },
}

impl AuthError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Session { .. } => ErrorKind::Session,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Store { .. } => ErrorKind::Store,
            Self::Gateway { .. } => ErrorKind::Gateway,
            Self::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    pub(crate) fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(resource: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            key: key.to_string(),
        }
    }

    pub(crate) fn session(reason: impl Into<String>) -> Self {
        Self::Session {
            reason: reason.into(),
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub(crate) fn store(details: impl fmt::Display) -> Self {
        Self::Store {
            details: details.to_string(),
        }
    }

    pub(crate) fn conflict(details: impl Into<String>) -> Self {
        Self::Conflict {
            details: details.into(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { reason } => write!(f, "bad request: {reason}"),
            Self::AccessDenied { reason } => write!(f, "access denied: {reason}"),
            Self::NotFound { resource, key } => write!(f, "{resource} '{key}' not found"),
            Self::Session { reason } => write!(f, "session error: {reason}"),
            Self::Unauthorized { reason } => write!(f, "unauthorized: {reason}"),
            Self::Store { details } => write!(f, "store error: {details}"),
            Self::Gateway { provider, details } => {
                write!(f, "provider '{provider}' error: {details}")
            }
            Self::Conflict { details } => write!(f, "conflict: {details}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AccessDenied> for AuthError {
    fn from(denied: AccessDenied) -> Self {
        Self::AccessDenied {
            reason: denied.to_string(),
        }
    }
}
