//! Telemetry for admission decisions.
//!
//! The guard emits one [`AdmissionEvent`] per decision: `Admitted`, `Rejected`,
//! or `StoreFailed` (the fail-open path). Events flow through a
//! [`TelemetrySink`], which is just a `tower::Service<AdmissionEvent>`, so sinks
//! compose like any other tower service.
//!
//! - [`NullSink`]: discards events (the guard's default).
//! - [`LogSink`]: logs through `tracing`.
//! - [`MemorySink`]: bounded in-memory buffer, handy in tests.

pub mod events;
pub mod sinks;

pub use events::AdmissionEvent;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
