//! Unified error types for the newsfeed client.
//!
//! Lower layers keep their own error enums; anything crossing the resource
//! client boundary is folded into [`Error`], which only distinguishes
//! validation, session loss and a generic failed operation.

/// Unified error type returned by resource clients, queries and mutations.
///
/// `Clone` so one in-flight result can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Caller-side validation failed before any request was issued.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The remote operation failed (network, HTTP status or payload shape).
    #[error("OPERATION_FAILED: {operation}: {message}")]
    OperationFailed { operation: String, message: String },

    /// Credentials were rejected; the session has been reset.
    #[error("SESSION_INVALID: {0}")]
    SessionInvalid(String),

    /// Nothing cached under the requested key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Cached data could not be decoded into the requested type.
    #[error("DECODE_FAILED: {0}")]
    Decode(String),

    /// Reading or writing persisted credentials failed.
    #[error("CREDENTIALS: {0}")]
    Credentials(String),

    /// The query was cancelled before its result arrived.
    #[error("CANCELLED: {0}")]
    Cancelled(String),
}

impl Error {
    /// Build an [`Error::OperationFailed`] for the named operation.
    pub fn failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::OperationFailed { operation: operation.into(), message: message.into() }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::OperationFailed { .. } => "OPERATION_FAILED",
            Error::SessionInvalid(_) => "SESSION_INVALID",
            Error::CacheMiss(_) => "CACHE_MISS",
            Error::Decode(_) => "DECODE_FAILED",
            Error::Credentials(_) => "CREDENTIALS",
            Error::Cancelled(_) => "CANCELLED",
        }
    }

    /// Human-readable message suitable for an inline notice near the triggering control.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => msg.clone(),
            Error::OperationFailed { message, .. } => message.clone(),
            Error::SessionInvalid(_) => "Your session has expired, please sign in again".to_string(),
            Error::CacheMiss(_) | Error::Decode(_) | Error::Credentials(_) | Error::Cancelled(_) => {
                self.to_string()
            }
        }
    }

    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Error::SessionInvalid(_))
    }
}

impl From<crate::credentials::CredentialError> for Error {
    fn from(err: crate::credentials::CredentialError) -> Self {
        Error::Credentials(err.to_string())
    }
}
