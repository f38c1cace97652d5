//! Error types for admission control
use crate::rate_limit::Rejection;
use std::fmt;
use std::time::Duration;

/// Outcome of a guarded call that did not produce a response.
///
/// A rejection is the guard's normal output for an over-quota caller, not a
/// malfunction; it travels as a variant so the transport layer can map it to a
/// "too many requests" reply.
#[derive(Debug, Clone)]
pub enum AdmissionError<E> {
    /// The caller exhausted its quota for the current window.
    Rejected(Rejection),
    /// The caller was admitted and the wrapped handler failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for AdmissionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(r) => write!(
                f,
                "rate limit exceeded ({} requests per window); retry after {}s",
                r.limit, r.retry_after_secs
            ),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for AdmissionError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Rejected(_) => None,
        }
    }
}

impl<E> AdmissionError<E> {
    /// Check if the call was turned away by the limiter.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
    /// Check if this error wraps a handler error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }
    /// Borrow the rejection details if present.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }
    /// Suggested wait before retrying, for rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        self.rejection().map(|r| Duration::from_secs(r.retry_after_secs))
    }
    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors produced when validating a policy or a policy set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Window length must be at least one millisecond.
    #[error("policy '{policy}': window must be at least 1ms")]
    ZeroWindow {
        /// Offending policy name.
        policy: String,
    },
    /// At least one request must be admitted per window.
    #[error("policy '{policy}': max_requests must be > 0")]
    ZeroMaxRequests {
        /// Offending policy name.
        policy: String,
    },
    /// Names are key prefixes: non-empty and free of `:`.
    #[error("invalid policy name '{name}': must be non-empty and must not contain ':'")]
    InvalidName {
        /// Name provided by caller.
        name: String,
    },
    /// A policy set already holds a policy with this name.
    #[error("duplicate policy '{name}'")]
    Duplicate {
        /// Name that was registered twice.
        name: String,
    },
    /// Configuration text could not be parsed.
    #[error("invalid rate limit config: {0}")]
    Parse(String),
}

/// Errors from starting the background sweep.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    /// A zero interval would spin.
    #[error("sweep interval must be > 0")]
    ZeroInterval,
    /// The sweep task needs a tokio runtime to live on.
    #[error("sweep must be started from within a tokio runtime")]
    NoRuntime,
}
