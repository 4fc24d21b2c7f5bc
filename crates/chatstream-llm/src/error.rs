use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Upstream provider returned an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Error while reading the vendor stream
    #[error("streaming error: {0}")]
    Streaming(String),

    /// No vendor event arrived within the idle timeout
    #[error("streaming timeout: no data received for {0:?}")]
    StreamingTimeout(Duration),

    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// The tool loop reached its iteration ceiling
    #[error("max tool resolution depth ({limit}) exceeded")]
    MaxToolDepthExceeded {
        /// Configured ceiling
        limit: usize,
    },

    /// Caller supplied a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Provider does not support the requested feature
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether this error indicates a transient condition worth retrying
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::Streaming(_) | Self::StreamingTimeout(_)
        )
    }

    /// Whether the watchdog cancelled the request
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::StreamingTimeout(_))
    }
}

/// Errors raised while resolving a tool call
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under this name
    #[error("unknown tool {0}")]
    UnknownTool(String),

    /// Arguments did not match the expected shape
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    /// The request carries no tool registry
    #[error("no tools available")]
    NoTools,

    /// The tool ran and failed
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    /// Build a failure from any displayable cause
    pub fn failed(cause: impl std::fmt::Display) -> Self {
        Self::Failed(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_error_names_the_ceiling() {
        let err = LlmError::MaxToolDepthExceeded { limit: 10 };
        assert_eq!(err.to_string(), "max tool resolution depth (10) exceeded");
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_distinguishable() {
        let err = LlmError::StreamingTimeout(Duration::from_secs(30));
        assert!(err.is_timeout());
        assert!(err.is_retryable());
        assert!(!LlmError::Cancelled.is_timeout());
        assert!(!LlmError::Streaming("reset".into()).is_timeout());
    }

    #[test]
    fn tool_error_messages() {
        assert_eq!(ToolError::UnknownTool("lookup".into()).to_string(), "unknown tool lookup");
        assert_eq!(ToolError::failed("disk full").to_string(), "disk full");
    }
}
