use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::LlmError;

/// Why a request was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The watchdog saw no vendor event within the idle timeout
    Timeout(Duration),
    /// The caller cancelled or dropped the stream
    Caller,
}

impl CancelReason {
    /// Terminal error reported for this reason
    pub const fn into_error(self) -> LlmError {
        match self {
            Self::Timeout(timeout) => LlmError::StreamingTimeout(timeout),
            Self::Caller => LlmError::Cancelled,
        }
    }
}

/// Cancellation signal that remembers its cause
///
/// The first reason recorded wins, so a caller cancelling after the
/// watchdog fired still reports the timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl CancelSignal {
    /// Fresh, uncancelled signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with a reason
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Whether the signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Recorded reason, if cancelled
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// Resolves once the signal fires
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Terminal error for the recorded reason
    pub fn error(&self) -> LlmError {
        self.reason().map_or(LlmError::Cancelled, CancelReason::into_error)
    }
}
