//! Convenient re-exports for common quotaguard types.
pub use crate::{
    clock::{Clock, ManualClock, SystemClock},
    rate_limit::{
        guard, Admission, Admitted, CallerInfo, Decision, Guard, Identify, IdentifyChain,
        InMemoryLimitStore, LimitStore, OriginAddr, Quota, RateLimitLayer, Rejection, UserId,
    },
    telemetry::{AdmissionEvent, LogSink, MemorySink, NullSink},
    AdmissionError, Policy, PolicyError, PolicySet, SweepError,
};
