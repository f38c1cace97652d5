use std::fmt;

/// Events emitted by the guard for every admission decision.
///
/// These can be collected, aggregated, or forwarded for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionEvent {
    /// A call was admitted and forwarded to the wrapped handler.
    Admitted {
        /// Policy that was consulted.
        policy: String,
        /// Caller identifier, e.g. `user:42`.
        identifier: String,
        /// Attempts left in the window.
        remaining: u32,
    },
    /// A call was over quota and turned away.
    Rejected {
        /// Policy that was consulted.
        policy: String,
        /// Caller identifier.
        identifier: String,
        /// Seconds until the window ends.
        retry_after_secs: u64,
    },
    /// The store could not answer; the call was admitted anyway.
    StoreFailed {
        /// Policy that was consulted.
        policy: String,
        /// Caller identifier.
        identifier: String,
        /// Store error, rendered.
        error: String,
    },
}

impl AdmissionEvent {
    /// Policy the event belongs to.
    pub fn policy(&self) -> &str {
        match self {
            AdmissionEvent::Admitted { policy, .. }
            | AdmissionEvent::Rejected { policy, .. }
            | AdmissionEvent::StoreFailed { policy, .. } => policy,
        }
    }

    /// Caller the event belongs to.
    pub fn identifier(&self) -> &str {
        match self {
            AdmissionEvent::Admitted { identifier, .. }
            | AdmissionEvent::Rejected { identifier, .. }
            | AdmissionEvent::StoreFailed { identifier, .. } => identifier,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, AdmissionEvent::Rejected { .. })
    }
}

impl fmt::Display for AdmissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionEvent::Admitted { policy, identifier, remaining } => {
                write!(f, "Admitted({}, {}, remaining={})", policy, identifier, remaining)
            }
            AdmissionEvent::Rejected { policy, identifier, retry_after_secs } => {
                write!(f, "Rejected({}, {}, retry_after={}s)", policy, identifier, retry_after_secs)
            }
            AdmissionEvent::StoreFailed { policy, identifier, error } => {
                write!(f, "StoreFailed({}, {}, error={})", policy, identifier, error)
            }
        }
    }
}
