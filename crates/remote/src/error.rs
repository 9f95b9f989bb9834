//! Error types for the remote gateway crate.

use rumbo_core::sync::GatewayError;
use thiserror::Error;

/// Result type alias for remote API operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors that can occur while talking to the remote store API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the remote store
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl RemoteError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<RemoteError> for GatewayError {
    fn from(err: RemoteError) -> Self {
        match &err {
            RemoteError::Auth(_) => GatewayError::auth(err.to_string()),
            RemoteError::Api { status: 401 | 403, .. } => GatewayError::auth(err.to_string()),
            RemoteError::Json(_) => GatewayError::decode(err.to_string()),
            _ => GatewayError::transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumbo_core::sync::RetryClass;

    #[test]
    fn unauthorized_maps_to_terminal_auth_error() {
        let err: GatewayError = RemoteError::api(401, "unauthorized").into();
        assert!(err.is_auth());
        assert_eq!(err.retry_class(), RetryClass::ReauthRequired);
    }

    #[test]
    fn server_errors_map_to_retryable_transport() {
        let err: GatewayError = RemoteError::api(503, "unavailable").into();
        assert_eq!(err.retry_class(), RetryClass::Retryable);
    }

    #[test]
    fn decode_failures_are_permanent() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GatewayError = RemoteError::Json(json_err).into();
        assert_eq!(err.retry_class(), RetryClass::Permanent);
    }
}
