//! Guard error types.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::inflight::RequestId;

/// Why the guard refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The server reported overload and the cooldown has not elapsed.
    CircuitOpen,
    /// Preventive pause until the window resets.
    Paused,
    /// The window reached the block threshold.
    WindowExhausted,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockReason::CircuitOpen => "circuit open",
            BlockReason::Paused => "paused",
            BlockReason::WindowExhausted => "window exhausted",
        };
        f.write_str(s)
    }
}

/// Errors surfaced to callers of a guarded client.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Admission refused. Back off for `retry_after` instead of retrying now.
    #[error("request blocked by rate-limit guard ({reason}), retry in {}ms", .retry_after.as_millis())]
    Blocked {
        reason: BlockReason,
        retry_after: Duration,
    },

    /// The guard aborted this request mid-flight. Transient, not a definitive failure.
    #[error("request {id} cancelled by rate-limit guard")]
    Cancelled { id: RequestId },

    /// The server answered 429 Too Many Requests.
    #[error("server reported too many requests, retry in {}ms", .backoff.as_millis())]
    ServerOverload {
        /// Parsed `Retry-After` hint, if the server sent one.
        retry_after: Option<Duration>,
        /// The hint, or the configured fallback.
        backoff: Duration,
    },

    /// The request queue went away before the task ran.
    #[error("request queue closed")]
    QueueClosed,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GuardError {
    /// Delay a caller should wait before trying again, if the error implies one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GuardError::Blocked { retry_after, .. } => Some(*retry_after),
            GuardError::ServerOverload { backoff, .. } => Some(*backoff),
            _ => None,
        }
    }

    /// True for failures that say nothing about the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            GuardError::Cancelled { .. } => true,
            GuardError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// True for every error caused by rate limiting, local or remote.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            GuardError::Blocked { .. } | GuardError::Cancelled { .. } | GuardError::ServerOverload { .. }
        )
    }
}

/// Result type for guarded operations.
pub type GuardResult<T> = Result<T, GuardError>;
