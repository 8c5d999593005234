//! Mapping of failures to HTTP answers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::client::wire::ErrorResponse;
use crate::replica::RefreshError;
use crate::store::StoreError;

/// A failed request, rendered as `{error, message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    /// The operation is not served by this node's role.
    WrongRole(String),
    Unavailable(String),
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m),
            ApiError::WrongRole(m) => (StatusCode::CONFLICT, "wrong_role", m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, "no_server_available", m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", m),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = kind, message = %message, "Request failed");
        }
        let body = ErrorResponse {
            error: kind.to_string(),
            message: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Auth(m) => ApiError::Forbidden(m),
            StoreError::Parse(e) => ApiError::BadRequest(e.to_string()),
            e @ StoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            StoreError::Persist(m) => ApiError::Internal(m),
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        ApiError::Unavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Version;
    use crate::tree::TreeError;

    #[test]
    fn test_store_errors_map_to_status() {
        let cases = [
            (StoreError::Auth("no".into()), StatusCode::FORBIDDEN),
            (
                StoreError::Parse(TreeError::Parse { line: 3, message: "x".into() }),
                StatusCode::BAD_REQUEST,
            ),
            (StoreError::NotFound(Version::from("v1")), StatusCode::NOT_FOUND),
            (StoreError::Persist("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_wrong_role_is_conflict() {
        let response = ApiError::WrongRole("replica".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
