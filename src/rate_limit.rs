//! Fixed-window rate limiting primitives.
//!
//! This module provides the building blocks for admission control:
//! - [`LimitStore`]: the seam between the guard and counter state.
//! - [`Decision`]: the result of registering one attempt (Allowed/Denied).
//! - [`Guard`] and [`RateLimitLayer`]: middleware that identifies the caller, asks
//!   the store, and either rejects or forwards.
//!
//! # Architecture
//!
//! - **Middleware**: `RateLimitLayer` wraps your service. It doesn't know how
//!   counting works, only that it should ask a `LimitStore`.
//! - **Identification**: `IdentifyChain` (in `identify` module) turns a request
//!   into an identifier such as `user:42` or `ip:10.0.0.1`.
//! - **Storage**: `InMemoryLimitStore` (in `store` module) keeps per-window
//!   counters in process memory. A networked store can implement `LimitStore`;
//!   if it errors, the guard fails open.

pub mod identify;
pub mod middleware;
pub mod store;

pub use identify::{CallerInfo, Identify, IdentifyChain, OriginAddr, UserId, ANONYMOUS_ORIGIN};
pub use middleware::{guard, Admission, Admitted, Guard, RateLimitLayer, RateLimitService};
pub use store::InMemoryLimitStore;

use crate::Policy;

/// The decision returned for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The attempt is admitted.
    Allowed {
        /// Attempts left in the current window after this one.
        remaining: u32,
        /// Epoch millis at which the current window ends.
        reset_at_millis: u64,
    },
    /// The attempt is over quota.
    Denied {
        /// Whole seconds until the window ends, rounded up.
        retry_after_secs: u64,
        /// Epoch millis at which the current window ends.
        reset_at_millis: u64,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Attempts left in the window; always 0 when denied.
    pub fn remaining(&self) -> u32 {
        match self {
            Decision::Allowed { remaining, .. } => *remaining,
            Decision::Denied { .. } => 0,
        }
    }

    /// Epoch millis at which the current window ends.
    pub fn reset_at_millis(&self) -> u64 {
        match self {
            Decision::Allowed { reset_at_millis, .. } | Decision::Denied { reset_at_millis, .. } => {
                *reset_at_millis
            }
        }
    }

    /// Retry hint, only present on denial.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Decision::Denied { retry_after_secs, .. } => Some(*retry_after_secs),
            Decision::Allowed { .. } => None,
        }
    }
}

/// Storage interface for fixed-window counters.
///
/// `attempt` registers one attempt and answers whether it is admissible, as a
/// single atomic step per key.
#[async_trait::async_trait]
pub trait LimitStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Register one attempt by `identifier` under `policy`.
    async fn attempt(&self, identifier: &str, policy: &Policy) -> Result<Decision, Self::Error>;
}

#[async_trait::async_trait]
impl<T: LimitStore> LimitStore for std::sync::Arc<T> {
    type Error = T::Error;

    async fn attempt(&self, identifier: &str, policy: &Policy) -> Result<Decision, Self::Error> {
        (**self).attempt(identifier, policy).await
    }
}

/// Quota metadata attached to admitted calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// The policy's `max_requests`.
    pub limit: u32,
    /// Attempts left in the window.
    pub remaining: u32,
    /// Epoch millis at which the window ends.
    pub reset_at_millis: u64,
}

impl Quota {
    /// Conventional advisory headers: limit, remaining, and reset (epoch seconds).
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, ceil_secs(self.reset_at_millis).to_string()),
        ]
    }
}

/// Details handed back when a caller is over quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// The policy's `max_requests`.
    pub limit: u32,
    /// Always 0.
    pub remaining: u32,
    /// Epoch millis at which the window ends.
    pub reset_at_millis: u64,
    /// Whole seconds to wait, rounded up.
    pub retry_after_secs: u64,
}

impl Rejection {
    /// HTTP "Too Many Requests".
    pub const STATUS: u16 = 429;

    /// Quota headers plus `Retry-After`.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        let [limit, remaining, reset] = self.quota().headers();
        [limit, remaining, reset, (HEADER_RETRY_AFTER, self.retry_after_secs.to_string())]
    }

    fn quota(&self) -> Quota {
        Quota { limit: self.limit, remaining: 0, reset_at_millis: self.reset_at_millis }
    }
}

/// Header carrying the policy's `max_requests`.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying attempts left in the window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the window end, in epoch seconds.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
/// Header carrying whole seconds to wait after a rejection.
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Milliseconds to whole seconds, rounding up.
pub(crate) fn ceil_secs(millis: u64) -> u64 {
    millis / 1000 + u64::from(millis % 1000 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_accessors() {
        let allowed = Decision::Allowed { remaining: 2, reset_at_millis: 60_000 };
        assert!(allowed.is_allowed());
        assert_eq!(allowed.remaining(), 2);
        assert_eq!(allowed.retry_after_secs(), None);
        assert_eq!(allowed.reset_at_millis(), 60_000);

        let denied = Decision::Denied { retry_after_secs: 45, reset_at_millis: 60_000 };
        assert!(!denied.is_allowed());
        assert_eq!(denied.remaining(), 0);
        assert_eq!(denied.retry_after_secs(), Some(45));
        assert_eq!(denied.reset_at_millis(), 60_000);
    }

    #[test]
    fn ceil_secs_rounds_up_partial_seconds() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1_000), 1);
        assert_eq!(ceil_secs(45_001), 46);
        assert_eq!(ceil_secs(u64::MAX), u64::MAX / 1000 + 1);
    }

    #[test]
    fn rejection_headers_include_retry_after() {
        let r = Rejection {
            limit: 3,
            remaining: 0,
            reset_at_millis: 1_700_000_000_500,
            retry_after_secs: 45,
        };
        let headers = r.headers();
        assert_eq!(headers[0], ("X-RateLimit-Limit", "3".to_string()));
        assert_eq!(headers[1], ("X-RateLimit-Remaining", "0".to_string()));
        assert_eq!(headers[2], ("X-RateLimit-Reset", "1700000001".to_string()));
        assert_eq!(headers[3], ("Retry-After", "45".to_string()));
    }
}
