//! Error types for the storefront.
//!
//! Nothing here is fatal: every failure path ends in a retry affordance or a
//! redirect for the user.

use thiserror::Error;

/// Errors returned by the backend adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Missing or rejected credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend answered with a non-success status
    #[error("Backend rejected request (status {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Message from the response body, if any
        message: Option<String>,
        /// Field-level errors from the response body
        errors: Vec<String>,
    },

    /// The response body could not be read
    #[error("Response parsing failed: {0}")]
    Decode(String),
}

impl ApiError {
    /// The backend's own explanation, suitable for showing to the user verbatim
    #[must_use]
    pub fn backend_message(&self) -> Option<String> {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message.clone()),
            Self::Rejected { errors, .. } => errors.first().cloned(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Errors from durable client storage
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing store failed
    #[error("Storage I/O failed for key {key}: {source}")]
    Io {
        /// Storage key
        key: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The store refused the write
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by a checkout session
///
/// Each variant carries the message shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Billing form is incomplete; no backend call was made
    #[error("{0}")]
    Validation(String),

    /// The backend refused to create the order
    #[error("{0}")]
    OrderCreation(String),

    /// The payment handshake failed or returned an unrecognized shape
    #[error("{0}")]
    PaymentInit(String),

    /// The gateway reported a terminal failure
    #[error("{0}")]
    PaymentFailed(String),

    /// The session countdown reached zero before payment succeeded
    #[error("Your checkout session expired. Please review your cart and try again.")]
    SessionExpired,
}

/// Errors from the order/ticket query facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Orders could not be fetched
    #[error("Could not load orders: {0}")]
    Fetch(String),
}

/// Errors loading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse
    #[error("Invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// A setting is out of range
    #[error("Invalid configuration: {0}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_prefers_message() {
        let error = ApiError::Rejected {
            status: 422,
            message: Some("Only 2 VIP tickets left".to_string()),
            errors: vec!["quantity: too large".to_string()],
        };
        assert_eq!(error.backend_message().as_deref(), Some("Only 2 VIP tickets left"));
    }

    #[test]
    fn test_backend_message_falls_back_to_errors() {
        let error = ApiError::Rejected {
            status: 422,
            message: Some("  ".to_string()),
            errors: vec!["email: invalid".to_string()],
        };
        assert_eq!(error.backend_message().as_deref(), Some("email: invalid"));
        assert_eq!(ApiError::Timeout.backend_message(), None);
    }
}
