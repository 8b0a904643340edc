//! Router and application state assembly.

use crate::admin;
use crate::auth::{AppState, CookieTransport, require_actor, routes};
use crate::config::ServerConfig;
use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use realmgate_authz::Policy;
use realmgate_core::IdGenerator;
use realmgate_platform_access::{
    AdminService, CookieCodec, CookieError, Directory, OAuthGateway, SessionCache, SessionManager,
    SessionStore,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Wires the session manager, admin service and cookie transport together.
///
/// # Errors
///
/// Returns an error if the cookie secret is empty.
pub fn build_state(
    config: &ServerConfig,
    directory: Arc<dyn Directory>,
    cache: Arc<dyn SessionCache>,
    gateway: Arc<dyn OAuthGateway>,
    ids: Arc<dyn IdGenerator>,
) -> Result<Arc<AppState>, CookieError> {
    let codec = CookieCodec::new(&config.cookie_secret)?;
    let store = SessionStore::new(cache, config.session_ttl());
    let manager = SessionManager::new(directory.clone(), store, gateway, ids.clone());
    let admin = AdminService::new(directory, Policy::new(config.provider_scope), ids);

    Ok(Arc::new(AppState::new(
        manager,
        admin,
        CookieTransport::new(codec, config.cookie_name.clone()),
        config.local_admin,
    )))
}

/// Builds the HTTP router.
///
/// `/auth/me` and the admin routes require an actor; the other `/auth/*`
/// routes authenticate themselves or not at all.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(routes::me))
        .merge(admin::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_actor));

    Router::new()
        .route("/auth/link", get(routes::link))
        .route("/auth/login", post(routes::login))
        .route("/auth/refresh", put(routes::refresh))
        .route("/auth/logout", delete(routes::logout))
        .route("/auth/session", delete(routes::logout))
        .route("/auth/verify", get(routes::verify))
        .route("/auth/local", post(routes::local_admin))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
