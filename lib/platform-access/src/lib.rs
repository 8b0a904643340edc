//! Authentication and session handling for realmgate.
//!
//! This crate provides:
//! - Directory records (`Realm`, `Provider`, `User`, `Daemon`, `ApiKey`) and
//!   the repository traits that persist them
//! - The OAuth2 session lifecycle (`SessionManager`) over a TTL cache
//!   (`SessionCache`, `SessionStore`) and a provider boundary (`OAuthGateway`)
//! - The encrypted session cookie (`CookieCodec`, `UserSession`)
//! - API key resolution for non-interactive callers (`ApiKeyResolver`)
//! - Policy-guarded administration (`AdminService`)
//!
//! # Example
//!
//! ```
//! use realmgate_authz::SystemRole;
//! use realmgate_core::{RealmId, UserId};
//! use realmgate_platform_access::{CookieCodec, SecurityContext, SessionId, UserSession};
//!
//! let codec = CookieCodec::new("a sufficiently long secret").expect("codec");
//! let ctx = SecurityContext::from_host("app.example.com:443", true);
//! let session = UserSession::new(
//!     SessionId::from("opaque-session-id"),
//!     RealmId::new(),
//!     UserId::new(),
//!     SystemRole::User,
//! );
//!
//! let value = codec.encode(&ctx, &session).expect("encode");
//! assert_eq!(codec.decode(&ctx, &value).expect("decode"), session);
//!
//! // The same value is rejected for another origin.
//! let other = SecurityContext::from_host("other.example.com", true);
//! assert!(codec.decode(&other, &value).is_err());
//! ```

pub mod admin;
pub mod api_key;
pub mod cache;
pub mod cookie;
pub mod daemon;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod memory;
pub mod provider;
pub mod realm;
pub mod session;
pub mod user;

// Re-export main types at crate root
pub use admin::{AdminService, ApiKeyDraft, DaemonDraft, ProviderDraft, RealmDraft, UserDraft};
pub use api_key::{ApiKey, ApiKeyOwner, ApiKeyResolver, BearerCredentials, ResolvedApiKey};
pub use cache::{MemorySessionCache, SessionCache, SessionStore};
pub use cookie::{CookieCodec, CookieError, SecurityContext, UserSession};
pub use daemon::Daemon;
pub use directory::{
    DaemonRepository, Directory, ProviderRepository, RealmRepository, UserRepository,
};
pub use error::{AuthError, ErrorKind};
pub use gateway::{AuthorizationRequest, OAuthGateway, ProviderIdentity};
pub use manager::{ProviderLink, SessionManager};
pub use memory::{MemoryDirectory, Seed};
pub use provider::{Provider, ProviderEndpoints, ProviderType};
pub use realm::Realm;
pub use session::{LinkAction, OAuthToken, Session, SessionId};
pub use user::User;
