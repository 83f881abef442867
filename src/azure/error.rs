use std::time::Duration;

use thiserror::Error;

/// Failure reported by the resource client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Credentials are missing, expired or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network failure, timeout, throttling or a server-side error.
    #[error("{message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The requested scope or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other request the provider refused.
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },
}

impl ClientError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Errors caused by user input or resource state rather than a fault.
    /// Used to pick the log level.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Rejected { .. })
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ClientError::transient("timeout").is_retryable());
        assert!(!ClientError::Auth("expired".into()).is_retryable());
        assert!(!ClientError::NotFound("rg".into()).is_retryable());
        assert!(!ClientError::rejected("Conflict", "busy").is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ClientError::rejected("OperationNotAllowed", "quota").to_string(),
            "OperationNotAllowed: quota"
        );
        assert_eq!(
            ClientError::NotFound("rg-1".into()).to_string(),
            "not found: rg-1"
        );
    }
}
