//! Transport error types.

use std::sync::Arc;

use newsfeed_core::Error;

/// Errors from the HTTP transport.
///
/// `Clone` (the reqwest error is behind an `Arc`) so results can be shared
/// between deduplicated callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Building the underlying HTTP client failed.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// Credentials were rejected (HTTP 401).
    #[error("unauthorized: credentials rejected")]
    Unauthorized,

    /// Non-success HTTP status.
    #[error("HTTP error {status}: {}", .detail.as_deref().unwrap_or("request failed"))]
    Http { status: u16, detail: Option<String> },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error, no response received.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { TransportError::Timeout } else { TransportError::Network(Arc::new(err)) }
    }
}

impl TransportError {
    /// Fold into the unified error for the named operation.
    ///
    /// Only a rejected session keeps its identity; everything else becomes a
    /// generic failed operation carrying a readable message.
    pub fn into_api_error(self, operation: &str) -> Error {
        match self {
            TransportError::Unauthorized => Error::SessionInvalid(format!("{operation}: credentials rejected")),
            TransportError::Http { detail: Some(detail), .. } => Error::failed(operation, detail),
            TransportError::Http { status, detail: None } => {
                Error::failed(operation, format!("{operation} failed (status {status})"))
            }
            other => Error::failed(operation, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::Http { status: 404, detail: Some("Article not found".into()) };
        assert_eq!(err.to_string(), "HTTP error 404: Article not found");

        let err = TransportError::Http { status: 500, detail: None };
        assert_eq!(err.to_string(), "HTTP error 500: request failed");
    }

    #[test]
    fn test_into_api_error() {
        let err = TransportError::Unauthorized.into_api_error("list sources");
        assert!(err.is_session_invalid());

        let err = TransportError::Http { status: 400, detail: Some("Article already saved".into()) }
            .into_api_error("save article");
        assert_eq!(err, Error::failed("save article", "Article already saved"));

        let err = TransportError::Http { status: 502, detail: None }.into_api_error("list articles");
        assert_eq!(err.user_message(), "list articles failed (status 502)");

        let err = TransportError::Timeout.into_api_error("get article");
        assert_eq!(err.code(), "OPERATION_FAILED");
    }
}
