//! Encrypted, context-bound session cookie values.
//!
//! The cookie carries a [`UserSession`] serialized as
//! `SessionID:RealmID:UserID:UserRole`. The payload is bound to the request's
//! [`SecurityContext`] by appending the scheme and domain before encryption:
//!
//! ```text
//! value = base64url(IV || AES-CFB(key, IV, "payload|scheme|domain"))
//! ```
//!
//! A fresh 16-byte IV is drawn from the OS CSPRNG for every encoding. The key
//! is the configured secret zero-padded to the smallest AES key size that
//! holds it (16, 24 or 32 bytes); longer secrets are truncated to 32 bytes.

use crate::error::AuthError;
use crate::session::SessionId;
use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use realmgate_authz::{Actor, SystemRole};
use realmgate_core::{RealmId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

const IV_LEN: usize = 16;
const FIELD_SEPARATOR: char = ':';
const CONTEXT_SEPARATOR: char = '|';

/// Errors from encoding or decoding a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieError {
    /// The configured secret is empty.
    EmptySecret,
    /// The OS random source failed.
    Random { reason: String },
    /// The value is not valid base64 or is too short to hold an IV.
    Encoding,
    /// The decrypted value is not a well-formed envelope or payload.
    Malformed { reason: String },
    /// The cookie was issued for a different domain or scheme.
    ContextMismatch,
}

impl fmt::Display for CookieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "cookie secret must not be empty"),
            Self::Random { reason } => write!(f, "failed to generate cookie IV: {reason}"),
            Self::Encoding => write!(f, "cookie value is not a valid encoding"),
            Self::Malformed { reason } => write!(f, "malformed cookie: {reason}"),
            Self::ContextMismatch => write!(f, "cookie was issued for another origin"),
        }
    }
}

impl std::error::Error for CookieError {}

impl From<CookieError> for AuthError {
    fn from(err: CookieError) -> Self {
        Self::Session {
            reason: err.to_string(),
        }
    }
}

fn malformed(reason: impl Into<String>) -> CookieError {
    CookieError::Malformed {
        reason: reason.into(),
    }
}

/// Where a cookie is issued and accepted: host without port, and whether the
/// request arrived over HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub domain: String,
    pub secure: bool,
}

impl SecurityContext {
    #[must_use]
    pub fn new(domain: impl Into<String>, secure: bool) -> Self {
        Self {
            domain: domain.into().to_ascii_lowercase(),
            secure,
        }
    }

    /// Builds a context from a `Host` header value.
    ///
    /// The port is dropped; IPv6 literals keep their brackets stripped.
    #[must_use]
    pub fn from_host(host: &str, secure: bool) -> Self {
        let host = host.trim();
        let domain = if let Some(rest) = host.strip_prefix('[') {
            rest.split(']').next().unwrap_or(rest)
        } else {
            host.split(':').next().unwrap_or(host)
        };
        Self::new(domain, secure)
    }

    fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }
}

/// The session descriptor carried by the cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub session_id: SessionId,
    pub realm_id: Option<RealmId>,
    pub user_id: Option<UserId>,
    pub role: SystemRole,
}

impl UserSession {
    /// Reserved session ID of the local-admin bootstrap cookie.
    pub const LOCAL_ADMIN_SESSION_ID: &'static str = "local-admin";

    #[must_use]
    pub fn new(
        session_id: SessionId,
        realm_id: RealmId,
        user_id: UserId,
        role: SystemRole,
    ) -> Self {
        Self {
            session_id,
            realm_id: Some(realm_id),
            user_id: Some(user_id),
            role,
        }
    }

    /// The descriptor carried by the local-admin bootstrap cookie.
    #[must_use]
    pub fn local_admin() -> Self {
        Self {
            session_id: SessionId::from(Self::LOCAL_ADMIN_SESSION_ID),
            realm_id: None,
            user_id: None,
            role: SystemRole::Admin,
        }
    }

    #[must_use]
    pub fn is_local_admin(&self) -> bool {
        self.session_id.as_str() == Self::LOCAL_ADMIN_SESSION_ID
    }

    /// The actor this session authenticates.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            realm_id: self.realm_id,
            role: self.role,
        }
    }

    /// Serializes as `SessionID:RealmID:UserID:UserRole`, absent IDs empty.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` when the session ID contains a separator.
    pub fn serialize(&self) -> Result<String, CookieError> {
        let session_id = self.session_id.as_str();
        if session_id.is_empty()
            || session_id.contains(FIELD_SEPARATOR)
            || session_id.contains(CONTEXT_SEPARATOR)
        {
            return Err(malformed("session id is empty or contains a separator"));
        }
        let realm_id = self.realm_id.map(|id| id.to_string()).unwrap_or_default();
        let user_id = self.user_id.map(|id| id.to_string()).unwrap_or_default();
        Ok(format!("{session_id}:{realm_id}:{user_id}:{}", self.role))
    }

    /// Parses the output of [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns `Malformed` unless there are exactly four valid fields.
    pub fn parse(payload: &str) -> Result<Self, CookieError> {
        let fields: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();
        let [session_id, realm_id, user_id, role] = fields.as_slice() else {
            return Err(malformed(format!(
                "expected 4 fields, found {}",
                fields.len()
            )));
        };
        if session_id.is_empty() {
            return Err(malformed("empty session id"));
        }
        let realm_id =
            optional_field(realm_id, |s| s.parse::<RealmId>().map_err(|e| e.to_string()))?;
        let user_id = optional_field(user_id, |s| s.parse::<UserId>().map_err(|e| e.to_string()))?;
        let role = role
            .parse::<SystemRole>()
            .map_err(|e| malformed(e.to_string()))?;

        Ok(Self {
            session_id: SessionId::from(*session_id),
            realm_id,
            user_id,
            role,
        })
    }
}

fn optional_field<T>(
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, String>,
) -> Result<Option<T>, CookieError> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse(raw).map(Some).map_err(malformed)
}

/// Symmetric AES-CFB key of one of the three AES sizes.
#[derive(Clone)]
enum CookieKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl CookieKey {
    fn from_secret(secret: &[u8]) -> Result<Self, CookieError> {
        fn padded<const N: usize>(secret: &[u8]) -> [u8; N] {
            let mut key = [0u8; N];
            let len = secret.len().min(N);
            key[..len].copy_from_slice(&secret[..len]);
            key
        }

        match secret.len() {
            0 => Err(CookieError::EmptySecret),
            1..=16 => Ok(Self::Aes128(padded(secret))),
            17..=24 => Ok(Self::Aes192(padded(secret))),
            _ => Ok(Self::Aes256(padded(secret))),
        }
    }

    fn encrypt(&self, iv: &[u8; IV_LEN], buf: &mut [u8]) -> Result<(), CookieError> {
        let invalid = |_| malformed("invalid key or IV length");
        match self {
            Self::Aes128(key) => cfb_mode::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(invalid)?
                .encrypt(buf),
            Self::Aes192(key) => cfb_mode::Encryptor::<aes::Aes192>::new_from_slices(key, iv)
                .map_err(invalid)?
                .encrypt(buf),
            Self::Aes256(key) => cfb_mode::Encryptor::<aes::Aes256>::new_from_slices(key, iv)
                .map_err(invalid)?
                .encrypt(buf),
        }
        Ok(())
    }

    fn decrypt(&self, iv: &[u8], buf: &mut [u8]) -> Result<(), CookieError> {
        let invalid = |_| malformed("invalid key or IV length");
        match self {
            Self::Aes128(key) => cfb_mode::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt(buf),
            Self::Aes192(key) => cfb_mode::Decryptor::<aes::Aes192>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt(buf),
            Self::Aes256(key) => cfb_mode::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt(buf),
        }
        Ok(())
    }

    fn bits(&self) -> usize {
        match self {
            Self::Aes128(_) => 128,
            Self::Aes192(_) => 192,
            Self::Aes256(_) => 256,
        }
    }
}

/// Encodes and decodes session cookie values under one secret.
#[derive(Clone)]
pub struct CookieCodec {
    key: CookieKey,
}

impl fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieCodec")
            .field("key_bits", &self.key.bits())
            .finish_non_exhaustive()
    }
}

impl CookieCodec {
    /// Creates a codec for the given secret.
    ///
    /// # Errors
    ///
    /// Returns `EmptySecret` if the secret is empty.
    pub fn new(secret: &str) -> Result<Self, CookieError> {
        Ok(Self {
            key: CookieKey::from_secret(secret.as_bytes())?,
        })
    }

    /// Encrypts `session` bound to `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized or no IV can be drawn.
    pub fn encode(
        &self,
        ctx: &SecurityContext,
        session: &UserSession,
    ) -> Result<String, CookieError> {
        let plaintext = format!(
            "{}{CONTEXT_SEPARATOR}{}{CONTEXT_SEPARATOR}{}",
            session.serialize()?,
            ctx.scheme(),
            ctx.domain
        );

        let mut iv = [0u8; IV_LEN];
        getrandom::fill(&mut iv).map_err(|e| CookieError::Random {
            reason: e.to_string(),
        })?;

        let mut buf = plaintext.into_bytes();
        self.key.encrypt(&iv, &mut buf)?;

        let mut out = Vec::with_capacity(IV_LEN + buf.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&buf);
        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypts a cookie value and checks it was issued for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad encoding, malformed payload, or when the
    /// cookie was issued for another domain or scheme.
    pub fn decode(&self, ctx: &SecurityContext, value: &str) -> Result<UserSession, CookieError> {
        let raw = URL_SAFE_NO_PAD
            .decode(value.trim())
            .map_err(|_| CookieError::Encoding)?;
        if raw.len() <= IV_LEN {
            return Err(CookieError::Encoding);
        }
        let (iv, ciphertext) = raw.split_at(IV_LEN);
        let mut buf = ciphertext.to_vec();
        self.key.decrypt(iv, &mut buf)?;

        let plaintext = String::from_utf8(buf).map_err(|_| malformed("not UTF-8"))?;
        let mut parts = plaintext.splitn(3, CONTEXT_SEPARATOR);
        let (Some(payload), Some(scheme), Some(domain)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("missing security context"));
        };
        if scheme != ctx.scheme() || domain != ctx.domain {
            return Err(CookieError::ContextMismatch);
        }

        UserSession::parse(payload)
    }
}
