//! Error types for handlers and invocation targets.

use thiserror::Error;

/// Error returned by a [`MessageHandler`](crate::MessageHandler).
///
/// A handler error aborts the current drain pass: the failing message and
/// everything still buffered behind it are returned to the broker for
/// redelivery. Handlers must therefore tolerate reprocessing — delivery is
/// at-least-once, never exactly-once.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    /// Create a handler error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a handler error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Error returned by an [`InvokeTarget`](crate::InvokeTarget).
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The invocation never reached the target or the response was lost.
    #[error("invoke transport failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The target was reached but reported failure.
    #[error("target failed with status {status}: {detail}")]
    Failed {
        /// Target-defined status code (HTTP status for HTTP targets).
        status: u16,
        /// Human-readable failure detail reported by the target.
        detail: String,
    },
}

impl InvokeError {
    /// Wrap a transport-level failure.
    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(source))
    }

    /// Report a target-side failure.
    pub fn failed(status: u16, detail: impl Into<String>) -> Self {
        Self::Failed {
            status,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let plain = HandlerError::new("record rejected");
        assert_eq!(plain.to_string(), "record rejected");

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout");
        let wrapped = HandlerError::with_source("downstream write failed", io);
        assert_eq!(wrapped.to_string(), "downstream write failed");
        assert!(std::error::Error::source(&wrapped).is_some());
    }

    #[test]
    fn test_invoke_error_failed() {
        let err = InvokeError::failed(502, "bad gateway");
        assert_eq!(err.to_string(), "target failed with status 502: bad gateway");
    }
}
