//! OAuth2 Authorization Code flow over HTTP.
//!
//! Authorization URLs and token requests go through the `oauth2` crate;
//! user-info and RFC 7009 revocation are plain `reqwest` calls. One
//! `reqwest::Client` is shared by every provider, with redirects disabled
//! and the configured timeout. Dropping a request future aborts the call.

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EmptyExtraTokenFields,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, StandardTokenResponse,
    TokenResponse, TokenUrl,
    basic::{BasicClient, BasicTokenType},
};
use realmgate_core::Result;
use realmgate_platform_access::{
    AuthError, AuthorizationRequest, LinkAction, OAuthGateway, OAuthToken, Provider,
    ProviderIdentity, ProviderType,
};
use rootcause::Report;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Type alias for the token response type.
type ProviderTokenResponse = StandardTokenResponse<EmptyExtraTokenFields, BasicTokenType>;

const USER_AGENT: &str = concat!("realmgate/", env!("CARGO_PKG_VERSION"));

fn gateway_error(provider: &Provider, details: impl fmt::Display) -> Report<AuthError> {
    AuthError::Gateway {
        provider: provider.code.clone(),
        details: details.to_string(),
    }
    .into()
}

fn config_error(provider: &Provider, what: &str, err: impl fmt::Display) -> Report<AuthError> {
    AuthError::BadRequest {
        reason: format!("provider '{}' has an invalid {what}: {err}", provider.code),
    }
    .into()
}

fn token_from_response(response: &ProviderTokenResponse) -> OAuthToken {
    OAuthToken {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_at: response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d),
    }
}

/// [`OAuthGateway`] talking to real providers.
#[derive(Clone)]
pub struct HttpOAuthGateway {
    http: reqwest::Client,
}

impl HttpOAuthGateway {
    /// Creates a gateway whose outbound calls time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> std::result::Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http })
    }

    fn redirect_url(provider: &Provider) -> Result<RedirectUrl, AuthError> {
        RedirectUrl::new(provider.redirect_url.clone())
            .map_err(|e| config_error(provider, "redirect URL", e))
    }

    fn token_url(provider: &Provider) -> Result<TokenUrl, AuthError> {
        let endpoints = provider.endpoints()?;
        TokenUrl::new(endpoints.token_url).map_err(|e| config_error(provider, "token URL", e))
    }
}

#[async_trait]
impl OAuthGateway for HttpOAuthGateway {
    fn authorization_request(
        &self,
        provider: &Provider,
        state: &str,
        action: LinkAction,
    ) -> Result<AuthorizationRequest, AuthError> {
        let endpoints = provider.endpoints()?;
        let auth_url = AuthUrl::new(endpoints.auth_url)
            .map_err(|e| config_error(provider, "authorization URL", e))?;
        let client = BasicClient::new(ClientId::new(provider.client_id.clone()))
            .set_client_secret(ClientSecret::new(provider.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(Self::redirect_url(provider)?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let state = state.to_string();

        let mut auth_request = client
            .authorize_url(move || CsrfToken::new(state))
            .set_pkce_challenge(pkce_challenge);
        for scope in endpoints.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope));
        }
        if provider.provider_type == ProviderType::Google {
            // Request offline access for refresh token
            auth_request = auth_request.add_extra_param("access_type", "offline");
        }
        if action == LinkAction::Consent {
            auth_request = auth_request.add_extra_param("prompt", "consent");
        }

        let (url, _state) = auth_request.url();
        Ok(AuthorizationRequest {
            url: url.to_string(),
            pkce_verifier: Some(pkce_verifier.secret().clone()),
        })
    }

    #[instrument(skip(self, provider, code, pkce_verifier), fields(provider = %provider.code))]
    async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<OAuthToken, AuthError> {
        let client = BasicClient::new(ClientId::new(provider.client_id.clone()))
            .set_client_secret(ClientSecret::new(provider.client_secret.clone()))
            .set_token_uri(Self::token_url(provider)?)
            .set_redirect_uri(Self::redirect_url(provider)?);

        let mut request = client.exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_string()));
        }

        let response: ProviderTokenResponse = request
            .request_async(&self.http)
            .await
            .map_err(|e| gateway_error(provider, format!("token exchange failed: {e}")))?;
        debug!("authorization code exchanged");
        Ok(token_from_response(&response))
    }

    #[instrument(skip(self, provider, refresh_token), fields(provider = %provider.code))]
    async fn refresh_token(
        &self,
        provider: &Provider,
        refresh_token: &str,
    ) -> Result<OAuthToken, AuthError> {
        let client = BasicClient::new(ClientId::new(provider.client_id.clone()))
            .set_client_secret(ClientSecret::new(provider.client_secret.clone()))
            .set_token_uri(Self::token_url(provider)?);

        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let response: ProviderTokenResponse = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
            .map_err(|e| gateway_error(provider, format!("token refresh failed: {e}")))?;
        debug!("access token refreshed");
        Ok(token_from_response(&response))
    }

    #[instrument(skip(self, provider, token), fields(provider = %provider.code))]
    async fn revoke_token(&self, provider: &Provider, token: &OAuthToken) -> Result<(), AuthError> {
        let Some(revoke_url) = provider.endpoints()?.revoke_url else {
            debug!("provider has no revocation endpoint, skipping");
            return Ok(());
        };

        // Revoking the refresh token also invalidates its access tokens.
        let (value, hint) = match &token.refresh_token {
            Some(refresh_token) => (refresh_token.as_str(), "refresh_token"),
            None => (token.access_token.as_str(), "access_token"),
        };
        let response = self
            .http
            .post(&revoke_url)
            .basic_auth(&provider.client_id, Some(&provider.client_secret))
            .form(&[("token", value), ("token_type_hint", hint)])
            .send()
            .await
            .map_err(|e| gateway_error(provider, format!("revocation failed: {e}")))?;

        if !response.status().is_success() {
            return Err(gateway_error(
                provider,
                format!("revocation returned {}", response.status()),
            ));
        }
        debug!("token revoked");
        Ok(())
    }

    #[instrument(skip(self, provider, token), fields(provider = %provider.code))]
    async fn user_info(
        &self,
        provider: &Provider,
        token: &OAuthToken,
    ) -> Result<ProviderIdentity, AuthError> {
        let endpoints = provider.endpoints()?;
        let info: serde_json::Value = self
            .http
            .get(&endpoints.userinfo_url)
            .bearer_auth(&token.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| gateway_error(provider, format!("user info request failed: {e}")))?
            .json()
            .await
            .map_err(|e| gateway_error(provider, format!("user info is not JSON: {e}")))?;

        Ok(ProviderIdentity::from_user_info(&provider.code, &info)?)
    }
}
