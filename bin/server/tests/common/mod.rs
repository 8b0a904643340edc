#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use realmgate_authz::{ProviderScope, SystemRole};
use realmgate_core::{IdGenerationError, IdGenerator, ProviderId, RealmId, Result};
use realmgate_platform_access::{
    ApiKey, AuthError, AuthorizationRequest, LinkAction, MemoryDirectory, MemorySessionCache,
    OAuthGateway, OAuthToken, Provider, ProviderIdentity, ProviderType, Realm, Seed, User,
};
use realmgate_server::config::ServerConfig;
use realmgate_server::{build_router, build_state};
use rootcause::Report;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const HOST: &str = "app.example.com";
pub const API_KEY: &str = "daemon-secret-key";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// The `name=value` pair of the first `Set-Cookie` header.
pub fn set_cookie(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(str::to_string)
}

pub struct SequentialIds(AtomicUsize);

impl IdGenerator for SequentialIds {
    fn generate_id(&self) -> std::result::Result<String, Report<IdGenerationError>> {
        Ok(format!("id{}", self.0.fetch_add(1, Ordering::SeqCst)))
    }
}

/// Provider stand-in that always authenticates `alice@example.com`.
#[derive(Default)]
pub struct FakeGateway {
    pub exchanges: AtomicUsize,
    pub revocations: AtomicUsize,
}

#[async_trait]
impl OAuthGateway for FakeGateway {
    fn authorization_request(
        &self,
        provider: &Provider,
        state: &str,
        action: LinkAction,
    ) -> Result<AuthorizationRequest, AuthError> {
        Ok(AuthorizationRequest {
            url: format!(
                "https://idp.example.com/authorize?client_id={}&state={state}&action={}",
                provider.client_id,
                action.as_str()
            ),
            pkce_verifier: Some("verifier".to_string()),
        })
    }

    async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        _pkce_verifier: Option<&str>,
    ) -> Result<OAuthToken, AuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == "bad-code" {
            return Err(AuthError::Gateway {
                provider: provider.code.clone(),
                details: "invalid_grant".to_string(),
            }
            .into());
        }
        Ok(OAuthToken {
            access_token: format!("access-{code}"),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh_token(
        &self,
        _provider: &Provider,
        _refresh_token: &str,
    ) -> Result<OAuthToken, AuthError> {
        Ok(OAuthToken {
            access_token: "refreshed".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn revoke_token(
        &self,
        _provider: &Provider,
        _token: &OAuthToken,
    ) -> Result<(), AuthError> {
        self.revocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn user_info(
        &self,
        _provider: &Provider,
        _token: &OAuthToken,
    ) -> Result<ProviderIdentity, AuthError> {
        Ok(ProviderIdentity {
            subject: "1234".to_string(),
            email: Some("alice@example.com".to_string()),
            name: Some("Alice".to_string()),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<FakeGateway>,
    pub realm_id: RealmId,
    pub disabled_realm_id: RealmId,
    pub seed: Seed,
}

fn seed() -> Seed {
    let acme = Realm::new("acme", "Acme");
    let mut dormant = Realm::new("dormant", "Dormant");
    dormant.enabled = false;

    let provider = |realm_id: RealmId, code: &str| Provider {
        id: ProviderId::new(),
        realm_id,
        provider_type: ProviderType::Google,
        code: code.to_string(),
        name: code.to_string(),
        enabled: true,
        client_id: "client-123".to_string(),
        client_secret: "secret".to_string(),
        redirect_url: format!("https://{HOST}/callback"),
        endpoints: None,
    };

    let alice = User::new(acme.id, "alice@example.com", SystemRole::User);
    let mut daemon = realmgate_platform_access::Daemon::new(acme.id, "indexer");
    daemon.api_keys.push(ApiKey::new("ci", API_KEY));

    Seed {
        providers: vec![provider(acme.id, "google"), provider(dormant.id, "google")],
        users: vec![alice],
        daemons: vec![daemon],
        realms: vec![acme, dormant],
    }
}

pub fn config(local_admin: bool) -> ServerConfig {
    ServerConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        cookie_name: "is_session".to_string(),
        cookie_secret: "integration-test-secret".to_string(),
        session_ttl_seconds: 3600,
        provider_timeout_seconds: 1,
        cleanup_interval_seconds: 60,
        local_admin,
        provider_scope: ProviderScope::Realm,
        seed_path: None,
    }
}

pub fn test_app(local_admin: bool) -> TestApp {
    let seed = seed();
    let realm_id = seed.realms[0].id;
    let disabled_realm_id = seed.realms[1].id;
    let directory = MemoryDirectory::from_seed(seed.clone()).expect("seed");
    let gateway = Arc::new(FakeGateway::default());
    let state = build_state(
        &config(local_admin),
        Arc::new(directory),
        Arc::new(MemorySessionCache::new()),
        gateway.clone(),
        Arc::new(SequentialIds(AtomicUsize::new(0))),
    )
    .expect("state");

    TestApp {
        router: build_router(state),
        gateway,
        realm_id,
        disabled_realm_id,
        seed,
    }
}
