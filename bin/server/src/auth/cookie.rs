//! Session cookie transport.
//!
//! [`CookieTransport`] turns a [`UserSession`] into a `Set-Cookie` and back,
//! using the request's [`SecurityContext`] as extracted by [`RequestContext`].

use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use realmgate_core::Result;
use realmgate_platform_access::{AuthError, CookieCodec, SecurityContext, UserSession};
use time::Duration as TimeDuration;

/// Header carrying the session cookie value for clients without a cookie jar.
pub const SESSION_HEADER: &str = "X-IS-SessionID";

/// Issues, reads and clears the session cookie.
#[derive(Debug, Clone)]
pub struct CookieTransport {
    codec: CookieCodec,
    name: String,
}

impl CookieTransport {
    #[must_use]
    pub fn new(codec: CookieCodec, name: impl Into<String>) -> Self {
        Self {
            codec,
            name: name.into(),
        }
    }

    /// The cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the session cookie for `session`.
    ///
    /// The cookie has no max-age; the cache TTL bounds the session.
    ///
    /// # Errors
    ///
    /// Returns a `Session` error if the session cannot be encoded.
    pub fn issue(
        &self,
        ctx: &SecurityContext,
        session: &UserSession,
    ) -> Result<Cookie<'static>, AuthError> {
        let value = self.codec.encode(ctx, session).map_err(AuthError::from)?;
        Ok(self.base(ctx, value))
    }

    /// Builds an empty, immediately expiring cookie that clears the session.
    #[must_use]
    pub fn reset(&self, ctx: &SecurityContext) -> Cookie<'static> {
        let mut cookie = self.base(ctx, String::new());
        cookie.set_max_age(TimeDuration::ZERO);
        cookie
    }

    /// Decodes the session cookie from the jar.
    ///
    /// # Errors
    ///
    /// Returns a `Session` error if the cookie is absent or does not verify.
    pub fn read(&self, ctx: &SecurityContext, jar: &CookieJar) -> Result<UserSession, AuthError> {
        let cookie = jar
            .get(&self.name)
            .filter(|cookie| !cookie.value().is_empty())
            .ok_or_else(|| AuthError::Session {
                reason: "no session cookie".to_string(),
            })?;
        self.decode(ctx, cookie.value())
    }

    /// Decodes a raw cookie value.
    ///
    /// # Errors
    ///
    /// Returns a `Session` error if the value does not verify under `ctx`.
    pub fn decode(&self, ctx: &SecurityContext, value: &str) -> Result<UserSession, AuthError> {
        Ok(self.codec.decode(ctx, value).map_err(AuthError::from)?)
    }

    fn base(&self, ctx: &SecurityContext, value: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), value))
            .path("/")
            .domain(ctx.domain.clone())
            .http_only(true)
            .secure(ctx.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}

/// The security context of the current request.
///
/// The domain comes from the `Host` header (or the request URI), the scheme
/// from `X-Forwarded-Proto` (or the request URI).
#[derive(Debug, Clone)]
pub struct RequestContext(pub SecurityContext);

fn forwarded_https(headers: &HeaderMap) -> Option<bool> {
    let proto = headers.get("x-forwarded-proto")?.to_str().ok()?;
    let first = proto.split(',').next()?.trim();
    Some(first.eq_ignore_ascii_case("https"))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| parts.uri.host())
            .filter(|host| !host.is_empty())
            .ok_or_else(|| AuthError::BadRequest {
                reason: "request has no host".to_string(),
            })?;
        let secure = forwarded_https(&parts.headers)
            .unwrap_or_else(|| parts.uri.scheme_str() == Some("https"));

        Ok(Self(SecurityContext::from_host(host, secure)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use realmgate_authz::SystemRole;
    use realmgate_core::{RealmId, UserId};
    use realmgate_platform_access::SessionId;

    fn transport() -> CookieTransport {
        CookieTransport::new(CookieCodec::new("cookie-secret").expect("codec"), "is_session")
    }

    async fn context(request: Request<()>) -> std::result::Result<SecurityContext, ApiError> {
        let (mut parts, ()) = request.into_parts();
        RequestContext::from_request_parts(&mut parts, &())
            .await
            .map(|RequestContext(ctx)| ctx)
    }

    #[test]
    fn issued_cookie_is_http_only_and_lax() {
        let ctx = SecurityContext::new("app.example.com", true);
        let session = UserSession::new(
            SessionId::from("abc"),
            RealmId::new(),
            UserId::new(),
            SystemRole::User,
        );
        let cookie = transport().issue(&ctx, &session).expect("cookie");
        assert_eq!(cookie.name(), "is_session");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.domain(), Some("app.example.com"));
        assert!(cookie.max_age().is_none());

        let jar = CookieJar::new().add(cookie);
        assert_eq!(transport().read(&ctx, &jar).expect("read"), session);
    }

    #[test]
    fn reset_cookie_expires_immediately() {
        let cookie = transport().reset(&SecurityContext::new("app.example.com", false));
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(TimeDuration::ZERO));
    }

    #[test]
    fn missing_cookie_is_a_session_error() {
        let err = transport()
            .read(&SecurityContext::new("app.example.com", false), &CookieJar::new())
            .unwrap_err();
        assert_eq!(err.current_context().kind(), realmgate_platform_access::ErrorKind::Session);
    }

    #[tokio::test]
    async fn context_uses_host_header_and_forwarded_proto() {
        let request = Request::builder()
            .uri("/auth/me")
            .header(header::HOST, "App.Example.com:8443")
            .header("x-forwarded-proto", "https")
            .body(())
            .expect("request");
        let ctx = context(request).await.expect("context");
        assert_eq!(ctx, SecurityContext::new("app.example.com", true));
    }

    #[tokio::test]
    async fn context_defaults_to_plain_http() {
        let request = Request::builder()
            .uri("/auth/me")
            .header(header::HOST, "localhost:8080")
            .body(())
            .expect("request");
        let ctx = context(request).await.expect("context");
        assert!(!ctx.secure);
        assert_eq!(ctx.domain, "localhost");
    }

    #[tokio::test]
    async fn request_without_host_is_rejected() {
        let request = Request::builder().uri("/auth/me").body(()).expect("request");
        let err = context(request).await.unwrap_err();
        assert_eq!(err.kind(), realmgate_platform_access::ErrorKind::BadRequest);
    }
}
