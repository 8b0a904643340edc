//! Authentication for the realmgate server.
//!
//! This module provides:
//! - the HTTP [`OAuthGateway`](realmgate_platform_access::OAuthGateway) used by the session manager
//! - the session cookie transport and request security context
//! - the require-actor middleware guarding administrative routes
//! - the `/auth/*` routes
//!
//! # Authorization Model
//!
//! Authentication ends at an [`Actor`](realmgate_authz::Actor): a verified
//! cookie yields the realm, user and role it was issued for. Whether that
//! actor may touch a resource is decided per call by the policy engine in
//! `realmgate-authz`, never here.

pub mod cookie;
pub mod gateway;
pub mod middleware;
pub mod routes;

pub use cookie::{CookieTransport, RequestContext, SESSION_HEADER};
pub use gateway::HttpOAuthGateway;
pub use middleware::{CurrentActor, require_actor};

use realmgate_platform_access::{AdminService, SessionManager};

/// Shared application state.
pub struct AppState {
    /// Provider links, logins, refreshes and logouts.
    pub manager: SessionManager,
    /// Policy-guarded administration.
    pub admin: AdminService,
    /// Session cookie transport.
    pub cookies: CookieTransport,
    /// Whether the local-admin bootstrap is enabled.
    pub local_admin: bool,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        manager: SessionManager,
        admin: AdminService,
        cookies: CookieTransport,
        local_admin: bool,
    ) -> Self {
        Self {
            manager,
            admin,
            cookies,
            local_admin,
        }
    }
}
