//! HTTP error responses.
//!
//! Handlers return [`ApiError`], which wraps a `Report<AuthError>` and maps
//! its kind to one status code with a `{"error": "..."}` body. Store and
//! gateway details are logged, not echoed to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use realmgate_platform_access::{AuthError, ErrorKind};
use rootcause::Report;
use serde_json::json;
use std::fmt;

/// An error returned by a handler.
#[derive(Debug)]
pub struct ApiError(Report<AuthError>);

impl ApiError {
    /// Returns the underlying error.
    #[must_use]
    pub fn error(&self) -> &AuthError {
        self.0.current_context()
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error().kind()
    }

    /// The HTTP status for an error kind.
    #[must_use]
    pub fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Session | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Gateway => StatusCode::BAD_GATEWAY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
        }
    }

    /// Wraps an error as a session error, keeping its message.
    #[must_use]
    pub fn session(report: &Report<AuthError>) -> Self {
        Self::from(AuthError::Session {
            reason: report.current_context().to_string(),
        })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Report<AuthError>> for ApiError {
    fn from(report: Report<AuthError>) -> Self {
        Self(report)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = Self::status_for(kind);
        let message = match kind {
            ErrorKind::Store => {
                tracing::error!(error = %self.0, "store error");
                "internal error".to_string()
            }
            ErrorKind::Gateway => {
                tracing::error!(error = %self.0, "identity provider error");
                "identity provider error".to_string()
            }
            _ => {
                tracing::debug!(error = %self.0, %status, "request failed");
                self.error().to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_status() {
        let cases = [
            (ErrorKind::BadRequest, 400),
            (ErrorKind::AccessDenied, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Session, 401),
            (ErrorKind::Unauthorized, 401),
            (ErrorKind::Store, 500),
            (ErrorKind::Gateway, 502),
            (ErrorKind::Conflict, 409),
        ];
        for (kind, status) in cases {
            assert_eq!(ApiError::status_for(kind).as_u16(), status, "{kind:?}");
        }
    }

    #[test]
    fn store_details_are_not_echoed() {
        let err = ApiError::from(AuthError::Store {
            details: "connection refused to 10.0.0.5".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
