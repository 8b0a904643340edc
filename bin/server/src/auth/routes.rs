//! `/auth/*` routes: provider links, login, refresh, logout, API key
//! verification and the local-admin bootstrap.

use super::{AppState, CurrentActor, RequestContext, SESSION_HEADER};
use crate::error::ApiError;
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use realmgate_authz::{Actor, SystemRole};
use realmgate_core::{ApiKeyId, RealmId, UserId};
use realmgate_platform_access::{
    ApiKeyOwner, AuthError, BearerCredentials, ErrorKind, LinkAction, UserSession,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Query parameters for a provider link.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkQuery {
    app_code: Option<String>,
    provider_code: Option<String>,
    action: Option<String>,
}

/// Query parameters for completing a login.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    code: Option<String>,
    state: Option<String>,
}

/// The session a cookie was issued for.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub realm_id: Option<RealmId>,
    pub user_id: Option<UserId>,
    pub role: SystemRole,
}

impl From<&UserSession> for SessionView {
    fn from(session: &UserSession) -> Self {
        Self {
            realm_id: session.realm_id,
            user_id: session.user_id,
            role: session.role,
        }
    }
}

/// The principal behind a verified API key.
#[derive(Debug, Serialize)]
pub struct VerifiedKey {
    pub realm_id: RealmId,
    pub owner: ApiKeyOwner,
    pub key_id: ApiKeyId,
    pub key_name: String,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        AuthError::BadRequest {
            reason: format!("{name} is required"),
        }
        .into()
    })
}

/// Returns the authorization URL of a realm's provider.
pub async fn link(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinkQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let realm_code = required(query.app_code, "appCode")?;
    let provider_code = required(query.provider_code, "providerCode")?;
    let action: LinkAction = query.action.as_deref().unwrap_or_default().parse()?;

    let link = state
        .manager
        .provider_link(&realm_code, &provider_code, action)
        .await?;
    Ok(Json(json!({ "link": link.url })))
}

/// Completes a login and issues the session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let code = required(query.code, "code")?;
    let login_state = required(query.state, "state")?;

    let session = state.manager.login(&code, &login_state).await?;
    let cookie = state.cookies.issue(&ctx, &session)?;
    Ok((jar.add(cookie), Json(SessionView::from(&session))))
}

/// Refreshes the provider token behind the session.
///
/// The session is taken from the `X-IS-SessionID` header when present,
/// otherwise from the cookie.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let header_value = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    let session = match header_value {
        Some(value) => state.cookies.decode(&ctx, value),
        None => state.cookies.read(&ctx, &jar),
    };
    let session = match session {
        Ok(session) => session,
        Err(err) => {
            return (jar.add(state.cookies.reset(&ctx)), ApiError::from(err)).into_response();
        }
    };

    if session.is_local_admin() {
        if state.local_admin {
            return Json(json!({ "refreshed": false })).into_response();
        }
        let err = ApiError::from(AuthError::Session {
            reason: "local admin is disabled".to_string(),
        });
        return (jar.add(state.cookies.reset(&ctx)), err).into_response();
    }

    match state.manager.authenticate(&session).await {
        Ok((verified, true)) => match state.cookies.issue(&ctx, &verified) {
            Ok(cookie) => {
                (jar.add(cookie), Json(json!({ "refreshed": true }))).into_response()
            }
            Err(err) => ApiError::from(err).into_response(),
        },
        Ok((_, false)) => Json(json!({ "refreshed": false })).into_response(),
        Err(err) => {
            (jar.add(state.cookies.reset(&ctx)), ApiError::from(err)).into_response()
        }
    }
}

/// Ends the session and clears the cookie.
///
/// Logging out without a valid session still clears the cookie and succeeds.
/// A provider revocation failure is reported after the session is gone.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    jar: CookieJar,
) -> Response {
    let jar_reset = jar.clone().add(state.cookies.reset(&ctx));

    let session = match state.cookies.read(&ctx, &jar) {
        Ok(session) => session,
        Err(err) => {
            debug!(error = %err, "logout without a valid session cookie");
            return (jar_reset, StatusCode::NO_CONTENT).into_response();
        }
    };
    if session.is_local_admin() {
        return (jar_reset, StatusCode::NO_CONTENT).into_response();
    }

    match state.manager.logout(&session.session_id).await {
        Ok(()) => (jar_reset, StatusCode::NO_CONTENT).into_response(),
        Err(err) if err.current_context().kind() == ErrorKind::AccessDenied => {
            debug!(session_id = %session.session_id, "logout of an unknown session");
            (jar_reset, StatusCode::NO_CONTENT).into_response()
        }
        Err(err) => {
            warn!(session_id = %session.session_id, error = %err, "logout failed");
            (jar_reset, ApiError::from(err)).into_response()
        }
    }
}

/// Resolves the API key in a `Bearer base64(realmID:key)` header.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<VerifiedKey>, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AuthError::BadRequest {
            reason: "missing authorization header".to_string(),
        })?;
    let credentials = BearerCredentials::parse_authorization(authorization)?;

    let resolved = state
        .manager
        .verify_api_key(credentials.realm_id, &credentials.key)
        .await?;
    Ok(Json(VerifiedKey {
        realm_id: resolved.realm_id,
        owner: resolved.owner,
        key_id: resolved.key.id,
        key_name: resolved.key.name,
    }))
}

/// Issues the local-admin cookie when the bootstrap is enabled.
pub async fn local_admin(
    State(state): State<Arc<AppState>>,
    RequestContext(ctx): RequestContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if !state.local_admin {
        return Err(AuthError::NotFound {
            resource: "route",
            key: "/auth/local".to_string(),
        }
        .into());
    }
    let session = UserSession::local_admin();
    let cookie = state.cookies.issue(&ctx, &session)?;
    warn!("local-admin session issued");
    Ok((jar.add(cookie), Json(SessionView::from(&session))))
}

/// Returns the authenticated actor.
pub async fn me(CurrentActor(actor): CurrentActor) -> Json<Actor> {
    Json(actor)
}
