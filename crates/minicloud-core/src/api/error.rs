use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a call made through the gateway.
///
/// `Clone` so a single failed fetch can be handed to every caller waiting on
/// the same cache key.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Unauthenticated - sign in required")]
    Unauthenticated,

    #[error("Network error: {0}")]
    NetworkError(#[source] Arc<reqwest::Error>),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Classify a non-success status. 401 is the only status that maps to
    /// `Unauthenticated`; everything else is left for the caller to interpret.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthenticated;
        }
        Self::request_failed(status, body)
    }

    /// Failed response kept as-is, whatever the status
    pub fn request_failed(status: StatusCode, body: &str) -> Self {
        ApiError::RequestFailed {
            status,
            body: Self::truncate_body(body),
        }
    }

    /// Status code of a `RequestFailed`, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller should send the user back to sign-in
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthenticated)
    }

    /// Transport failures and server-side errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkError(_) => true,
            ApiError::RequestFailed { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkError(Arc::new(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_unauthorized() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "token expired");
        assert!(matches!(err, ApiError::Unauthenticated));
        assert!(err.requires_login());
    }

    #[test]
    fn test_from_status_keeps_body() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, "Bucket name required");
        match err {
            ApiError::RequestFailed { status, ref body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "Bucket name required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_status_truncates_long_body() {
        let body = "x".repeat(2000);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        let ApiError::RequestFailed { body, .. } = err else {
            panic!("expected RequestFailed");
        };
        assert!(body.starts_with(&"x".repeat(500)));
        assert!(body.ends_with("(truncated, 2000 total bytes)"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        // 3-byte chars put byte 500 in the middle of a character
        let body = "€".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("(truncated, 1200 total bytes)"));
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "");
        assert!(err.is_retryable());
        assert!(!ApiError::Unauthenticated.is_retryable());
    }
}
