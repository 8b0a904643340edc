//! Administrative routes for realms, providers, users, daemons and API keys.
//!
//! Every handler runs behind [`require_actor`](crate::auth::require_actor) and
//! hands the actor to [`AdminService`](realmgate_platform_access::AdminService),
//! which consults the policy engine before touching the directory.

use crate::auth::{AppState, CurrentActor};
use crate::error::ApiError;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use realmgate_core::{ApiKeyId, DaemonId, ProviderId, RealmId, UserId};
use realmgate_platform_access::{
    ApiKey, ApiKeyDraft, ApiKeyOwner, Daemon, DaemonDraft, Provider, ProviderDraft,
    ProviderEndpoints, ProviderType, Realm, RealmDraft, User, UserDraft,
};
use serde::Serialize;
use std::sync::Arc;

type Shared = State<Arc<AppState>>;
type ApiResult<T> = Result<T, ApiError>;

/// A provider as returned to clients, without its client secret.
#[derive(Debug, Serialize)]
pub struct ProviderView {
    pub id: ProviderId,
    pub realm_id: RealmId,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub code: String,
    pub name: String,
    pub enabled: bool,
    pub client_id: String,
    pub redirect_url: String,
    pub endpoints: Option<ProviderEndpoints>,
}

impl From<Provider> for ProviderView {
    fn from(provider: Provider) -> Self {
        Self {
            id: provider.id,
            realm_id: provider.realm_id,
            provider_type: provider.provider_type,
            code: provider.code,
            name: provider.name,
            enabled: provider.enabled,
            client_id: provider.client_id,
            redirect_url: provider.redirect_url,
            endpoints: provider.endpoints,
        }
    }
}

/// Builds the administrative router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/realms", get(list_realms).post(create_realm))
        .route(
            "/realms/{realm_id}",
            get(get_realm).put(update_realm).delete(delete_realm),
        )
        .route(
            "/realms/{realm_id}/providers",
            get(list_providers).post(create_provider),
        )
        .route(
            "/realms/{realm_id}/providers/{provider_id}",
            get(get_provider).put(update_provider).delete(delete_provider),
        )
        .route("/realms/{realm_id}/users", get(list_users).post(create_user))
        .route(
            "/realms/{realm_id}/users/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route(
            "/realms/{realm_id}/daemons",
            get(list_daemons).post(create_daemon),
        )
        .route(
            "/realms/{realm_id}/daemons/{daemon_id}",
            get(get_daemon).put(update_daemon).delete(delete_daemon),
        )
        .route(
            "/realms/{realm_id}/users/{user_id}/keys",
            get(list_user_keys).post(create_user_key),
        )
        .route(
            "/realms/{realm_id}/users/{user_id}/keys/{key_id}",
            get(get_user_key).put(update_user_key).delete(delete_user_key),
        )
        .route(
            "/realms/{realm_id}/daemons/{daemon_id}/keys",
            get(list_daemon_keys).post(create_daemon_key),
        )
        .route(
            "/realms/{realm_id}/daemons/{daemon_id}/keys/{key_id}",
            get(get_daemon_key)
                .put(update_daemon_key)
                .delete(delete_daemon_key),
        )
}

// Realms

async fn list_realms(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Vec<Realm>>> {
    Ok(Json(state.admin.list_realms(&actor).await?))
}

async fn get_realm(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
) -> ApiResult<Json<Realm>> {
    Ok(Json(state.admin.get_realm(&actor, realm_id).await?))
}

async fn create_realm(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Json(draft): Json<RealmDraft>,
) -> ApiResult<(StatusCode, Json<Realm>)> {
    let realm = state.admin.create_realm(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(realm)))
}

async fn update_realm(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
    Json(draft): Json<RealmDraft>,
) -> ApiResult<Json<Realm>> {
    Ok(Json(state.admin.update_realm(&actor, realm_id, draft).await?))
}

async fn delete_realm(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
) -> ApiResult<StatusCode> {
    state.admin.delete_realm(&actor, realm_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Providers

async fn list_providers(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
) -> ApiResult<Json<Vec<ProviderView>>> {
    let providers = state.admin.list_providers(&actor, realm_id).await?;
    Ok(Json(providers.into_iter().map(ProviderView::from).collect()))
}

async fn get_provider(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, provider_id)): Path<(RealmId, ProviderId)>,
) -> ApiResult<Json<ProviderView>> {
    let provider = state.admin.get_provider(&actor, realm_id, provider_id).await?;
    Ok(Json(provider.into()))
}

async fn create_provider(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
    Json(draft): Json<ProviderDraft>,
) -> ApiResult<(StatusCode, Json<ProviderView>)> {
    let provider = state.admin.create_provider(&actor, realm_id, draft).await?;
    Ok((StatusCode::CREATED, Json(provider.into())))
}

async fn update_provider(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, provider_id)): Path<(RealmId, ProviderId)>,
    Json(draft): Json<ProviderDraft>,
) -> ApiResult<Json<ProviderView>> {
    let provider = state
        .admin
        .update_provider(&actor, realm_id, provider_id, draft)
        .await?;
    Ok(Json(provider.into()))
}

async fn delete_provider(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, provider_id)): Path<(RealmId, ProviderId)>,
) -> ApiResult<StatusCode> {
    state.admin.delete_provider(&actor, realm_id, provider_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Users

async fn list_users(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.admin.list_users(&actor, realm_id).await?))
}

async fn get_user(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, user_id)): Path<(RealmId, UserId)>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.admin.get_user(&actor, realm_id, user_id).await?))
}

async fn create_user(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
    Json(draft): Json<UserDraft>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.admin.create_user(&actor, realm_id, draft).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, user_id)): Path<(RealmId, UserId)>,
    Json(draft): Json<UserDraft>,
) -> ApiResult<Json<User>> {
    Ok(Json(
        state.admin.update_user(&actor, realm_id, user_id, draft).await?,
    ))
}

async fn delete_user(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, user_id)): Path<(RealmId, UserId)>,
) -> ApiResult<StatusCode> {
    state.admin.delete_user(&actor, realm_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Daemons

async fn list_daemons(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
) -> ApiResult<Json<Vec<Daemon>>> {
    Ok(Json(state.admin.list_daemons(&actor, realm_id).await?))
}

async fn get_daemon(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, daemon_id)): Path<(RealmId, DaemonId)>,
) -> ApiResult<Json<Daemon>> {
    Ok(Json(state.admin.get_daemon(&actor, realm_id, daemon_id).await?))
}

async fn create_daemon(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path(realm_id): Path<RealmId>,
    Json(draft): Json<DaemonDraft>,
) -> ApiResult<(StatusCode, Json<Daemon>)> {
    let daemon = state.admin.create_daemon(&actor, realm_id, draft).await?;
    Ok((StatusCode::CREATED, Json(daemon)))
}

async fn update_daemon(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, daemon_id)): Path<(RealmId, DaemonId)>,
    Json(draft): Json<DaemonDraft>,
) -> ApiResult<Json<Daemon>> {
    Ok(Json(
        state
            .admin
            .update_daemon(&actor, realm_id, daemon_id, draft)
            .await?,
    ))
}

async fn delete_daemon(
    State(state): Shared,
    CurrentActor(actor): CurrentActor,
    Path((realm_id, daemon_id)): Path<(RealmId, DaemonId)>,
) -> ApiResult<StatusCode> {
    state.admin.delete_daemon(&actor, realm_id, daemon_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// API keys. User and daemon keys share one set of operations keyed by owner.

async fn list_keys(
    state: &AppState,
    actor: CurrentActor,
    realm_id: RealmId,
    owner: ApiKeyOwner,
) -> ApiResult<Json<Vec<ApiKey>>> {
    Ok(Json(state.admin.list_api_keys(&actor.0, realm_id, owner).await?))
}

async fn get_key(
    state: &AppState,
    actor: CurrentActor,
    realm_id: RealmId,
    owner: ApiKeyOwner,
    key_id: ApiKeyId,
) -> ApiResult<Json<ApiKey>> {
    Ok(Json(
        state.admin.get_api_key(&actor.0, realm_id, owner, key_id).await?,
    ))
}

async fn create_key(
    state: &AppState,
    actor: CurrentActor,
    realm_id: RealmId,
    owner: ApiKeyOwner,
    draft: ApiKeyDraft,
) -> ApiResult<(StatusCode, Json<ApiKey>)> {
    let key = state.admin.create_api_key(&actor.0, realm_id, owner, draft).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

async fn update_key(
    state: &AppState,
    actor: CurrentActor,
    realm_id: RealmId,
    owner: ApiKeyOwner,
    key_id: ApiKeyId,
    draft: ApiKeyDraft,
) -> ApiResult<Json<ApiKey>> {
    Ok(Json(
        state
            .admin
            .update_api_key(&actor.0, realm_id, owner, key_id, draft)
            .await?,
    ))
}

async fn delete_key(
    state: &AppState,
    actor: CurrentActor,
    realm_id: RealmId,
    owner: ApiKeyOwner,
    key_id: ApiKeyId,
) -> ApiResult<StatusCode> {
    state
        .admin
        .delete_api_key(&actor.0, realm_id, owner, key_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_user_keys(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, user_id)): Path<(RealmId, UserId)>,
) -> ApiResult<Json<Vec<ApiKey>>> {
    list_keys(&state, actor, realm_id, ApiKeyOwner::User(user_id)).await
}

async fn get_user_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, user_id, key_id)): Path<(RealmId, UserId, ApiKeyId)>,
) -> ApiResult<Json<ApiKey>> {
    get_key(&state, actor, realm_id, ApiKeyOwner::User(user_id), key_id).await
}

async fn create_user_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, user_id)): Path<(RealmId, UserId)>,
    Json(draft): Json<ApiKeyDraft>,
) -> ApiResult<(StatusCode, Json<ApiKey>)> {
    create_key(&state, actor, realm_id, ApiKeyOwner::User(user_id), draft).await
}

async fn update_user_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, user_id, key_id)): Path<(RealmId, UserId, ApiKeyId)>,
    Json(draft): Json<ApiKeyDraft>,
) -> ApiResult<Json<ApiKey>> {
    update_key(&state, actor, realm_id, ApiKeyOwner::User(user_id), key_id, draft).await
}

async fn delete_user_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, user_id, key_id)): Path<(RealmId, UserId, ApiKeyId)>,
) -> ApiResult<StatusCode> {
    delete_key(&state, actor, realm_id, ApiKeyOwner::User(user_id), key_id).await
}

async fn list_daemon_keys(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, daemon_id)): Path<(RealmId, DaemonId)>,
) -> ApiResult<Json<Vec<ApiKey>>> {
    list_keys(&state, actor, realm_id, ApiKeyOwner::Daemon(daemon_id)).await
}

async fn get_daemon_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, daemon_id, key_id)): Path<(RealmId, DaemonId, ApiKeyId)>,
) -> ApiResult<Json<ApiKey>> {
    get_key(&state, actor, realm_id, ApiKeyOwner::Daemon(daemon_id), key_id).await
}

async fn create_daemon_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, daemon_id)): Path<(RealmId, DaemonId)>,
    Json(draft): Json<ApiKeyDraft>,
) -> ApiResult<(StatusCode, Json<ApiKey>)> {
    create_key(&state, actor, realm_id, ApiKeyOwner::Daemon(daemon_id), draft).await
}

async fn update_daemon_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, daemon_id, key_id)): Path<(RealmId, DaemonId, ApiKeyId)>,
    Json(draft): Json<ApiKeyDraft>,
) -> ApiResult<Json<ApiKey>> {
    update_key(&state, actor, realm_id, ApiKeyOwner::Daemon(daemon_id), key_id, draft).await
}

async fn delete_daemon_key(
    State(state): Shared,
    actor: CurrentActor,
    Path((realm_id, daemon_id, key_id)): Path<(RealmId, DaemonId, ApiKeyId)>,
) -> ApiResult<StatusCode> {
    delete_key(&state, actor, realm_id, ApiKeyOwner::Daemon(daemon_id), key_id).await
}
