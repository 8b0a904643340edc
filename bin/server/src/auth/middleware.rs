//! Require-actor middleware and extractor.
//!
//! [`require_actor`] verifies the session cookie against its cached session,
//! refreshes the provider token when it is stale, and stores the resulting
//! [`Actor`] in the request extensions for [`CurrentActor`] to pick up.

use super::{AppState, RequestContext};
use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use realmgate_authz::Actor;
use realmgate_platform_access::AuthError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authenticates the request or answers with a session error and a cleared cookie.
pub async fn require_actor(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let reject =
        |err: ApiError| (jar.clone().add(state.cookies.reset(&ctx)), err).into_response();

    let session = match state.cookies.read(&ctx, &jar) {
        Ok(session) => session,
        Err(err) => {
            debug!(error = %err, "rejecting request without a valid session cookie");
            return reject(err.into());
        }
    };

    if session.is_local_admin() {
        if !state.local_admin {
            warn!("local-admin cookie presented while the bootstrap is disabled");
            return reject(
                AuthError::Session {
                    reason: "local admin is disabled".to_string(),
                }
                .into(),
            );
        }
        request.extensions_mut().insert(Actor::local_admin());
        return next.run(request).await;
    }

    let (verified, refreshed) = match state.manager.authenticate(&session).await {
        Ok(result) => result,
        Err(err) => {
            warn!(
                session_id = %session.session_id,
                error = %err,
                "session could not be authenticated"
            );
            return reject(ApiError::session(&err));
        }
    };

    request.extensions_mut().insert(verified.actor());
    let response = next.run(request).await;

    if !refreshed && verified.role == session.role {
        return response;
    }
    // Re-issue the cookie alongside the handler's response.
    match state.cookies.issue(&ctx, &verified) {
        Ok(cookie) => (jar.add(cookie), response).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to re-issue session cookie");
            response
        }
    }
}

/// Extractor for the actor authenticated by [`require_actor`].
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .copied()
            .map(CurrentActor)
            .ok_or_else(|| {
                AuthError::Session {
                    reason: "request is not authenticated".to_string(),
                }
                .into()
            })
    }
}
