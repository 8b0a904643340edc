//! OAuth2 provider configuration.
//!
//! A provider is bound to one realm and must be enabled to be used for login.
//! Well-known provider types carry their endpoints; `Custom` providers name
//! theirs explicitly.

use crate::error::AuthError;
use realmgate_core::{ProviderId, RealmId};
use serde::{Deserialize, Serialize};

/// The kind of identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Google,
    Github,
    Custom,
}

/// OAuth2 endpoints and scopes of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// RFC 7009 revocation endpoint, when the provider has one.
    #[serde(default)]
    pub revoke_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ProviderEndpoints {
    fn google() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            revoke_url: Some("https://oauth2.googleapis.com/revoke".to_string()),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
        }
    }

    fn github() -> Self {
        Self {
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            revoke_url: None,
            scopes: vec!["read:user".to_string(), "user:email".to_string()],
        }
    }
}

/// An OAuth2 identity provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub realm_id: RealmId,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub code: String,
    pub name: String,
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    /// Overrides the built-in endpoints; required for `Custom` providers.
    #[serde(default)]
    pub endpoints: Option<ProviderEndpoints>,
}

impl Provider {
    /// Resolves the endpoints to use for this provider.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a custom provider without endpoints.
    pub fn endpoints(&self) -> Result<ProviderEndpoints, AuthError> {
        if let Some(endpoints) = &self.endpoints {
            return Ok(endpoints.clone());
        }
        match self.provider_type {
            ProviderType::Google => Ok(ProviderEndpoints::google()),
            ProviderType::Github => Ok(ProviderEndpoints::github()),
            ProviderType::Custom => Err(AuthError::bad_request(format!(
                "custom provider '{}' has no endpoints configured",
                self.code
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(provider_type: ProviderType) -> Provider {
        Provider {
            id: ProviderId::new(),
            realm_id: RealmId::new(),
            provider_type,
            code: "corp".to_string(),
            name: "Corp".to_string(),
            enabled: true,
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "https://app.example.com/callback".to_string(),
            endpoints: None,
        }
    }

    #[test]
    fn google_has_builtin_endpoints() {
        let endpoints = provider(ProviderType::Google).endpoints().expect("endpoints");
        assert!(endpoints.auth_url.starts_with("https://accounts.google.com"));
        assert!(endpoints.revoke_url.is_some());
        assert!(endpoints.scopes.contains(&"email".to_string()));
    }

    #[test]
    fn github_has_no_revoke_endpoint() {
        let endpoints = provider(ProviderType::Github).endpoints().expect("endpoints");
        assert!(endpoints.revoke_url.is_none());
    }

    #[test]
    fn custom_without_endpoints_is_rejected() {
        let err = provider(ProviderType::Custom).endpoints().unwrap_err();
        assert!(err.to_string().contains("corp"));
    }

    #[test]
    fn explicit_endpoints_override_builtin() {
        let mut p = provider(ProviderType::Google);
        p.endpoints = Some(ProviderEndpoints {
            auth_url: "http://127.0.0.1:9000/authorize".to_string(),
            token_url: "http://127.0.0.1:9000/token".to_string(),
            userinfo_url: "http://127.0.0.1:9000/userinfo".to_string(),
            revoke_url: None,
            scopes: Vec::new(),
        });
        let endpoints = p.endpoints().expect("endpoints");
        assert_eq!(endpoints.auth_url, "http://127.0.0.1:9000/authorize");
    }

    #[test]
    fn provider_type_serializes_as_type_field() {
        let json = serde_json::to_value(provider(ProviderType::Github)).expect("serialize");
        assert_eq!(json["type"], "github");
    }
}
