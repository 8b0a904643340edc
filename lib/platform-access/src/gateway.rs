//! Boundary to OAuth2 identity providers.
//!
//! The session manager only sees [`OAuthGateway`]; the server binary provides
//! the HTTP implementation and tests provide fakes.

use crate::error::AuthError;
use crate::provider::Provider;
use crate::session::{LinkAction, OAuthToken};
use async_trait::async_trait;
use realmgate_core::Result;
use serde::{Deserialize, Serialize};

/// An authorization URL together with the PKCE verifier it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub pkce_verifier: Option<String>,
}

/// The identity a provider reports for an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProviderIdentity {
    /// Extracts the identity from a user-info document.
    ///
    /// OIDC providers name the subject `sub`; GitHub names it `id` and may
    /// send it as a number.
    ///
    /// # Errors
    ///
    /// Returns `Gateway` if the document has no subject.
    pub fn from_user_info(
        provider: &str,
        info: &serde_json::Value,
    ) -> std::result::Result<Self, AuthError> {
        let subject = ["sub", "id"]
            .iter()
            .filter_map(|field| info.get(*field))
            .find_map(|value| match value {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| AuthError::Gateway {
                provider: provider.to_string(),
                details: "user info has no subject".to_string(),
            })?;
        let text = |field: &str| {
            info.get(field)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            subject,
            email: text("email"),
            name: text("name").or_else(|| text("login")),
        })
    }

    /// The bind identity used to find the local user: email, else subject.
    #[must_use]
    pub fn bind_id(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.subject)
    }
}

/// OAuth2 Authorization Code flow operations against one provider.
#[async_trait]
pub trait OAuthGateway: Send + Sync {
    /// Builds the authorization URL with `state` and, when supported, PKCE.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider configuration is invalid.
    fn authorization_request(
        &self,
        provider: &Provider,
        state: &str,
        action: LinkAction,
    ) -> Result<AuthorizationRequest, AuthError>;

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<OAuthToken, AuthError>;

    /// Exchanges a refresh token for a new access token.
    async fn refresh_token(
        &self,
        provider: &Provider,
        refresh_token: &str,
    ) -> Result<OAuthToken, AuthError>;

    /// Revokes a token at the provider.
    async fn revoke_token(&self, provider: &Provider, token: &OAuthToken) -> Result<(), AuthError>;

    /// Fetches the identity behind an access token.
    async fn user_info(
        &self,
        provider: &Provider,
        token: &OAuthToken,
    ) -> Result<ProviderIdentity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oidc_user_info_uses_sub_and_email() {
        let identity = ProviderIdentity::from_user_info(
            "google",
            &json!({"sub": "1234", "email": "alice@example.com", "name": "Alice"}),
        )
        .expect("identity");
        assert_eq!(identity.subject, "1234");
        assert_eq!(identity.bind_id(), "alice@example.com");
        assert_eq!(identity.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn github_user_info_uses_numeric_id() {
        let info = json!({"id": 42, "login": "octocat", "email": null});
        let identity = ProviderIdentity::from_user_info("github", &info).expect("identity");
        assert_eq!(identity.subject, "42");
        assert_eq!(identity.bind_id(), "42");
        assert_eq!(identity.name.as_deref(), Some("octocat"));
    }

    #[test]
    fn user_info_without_subject_is_gateway_error() {
        let err = ProviderIdentity::from_user_info("corp", &json!({"email": "a@b.c"})).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Gateway);
    }
}
