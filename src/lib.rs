#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # quotaguard
//!
//! Fixed-window request admission for async Rust: cap how many requests a caller
//! may make per window, per named policy.
//!
//! ## Features
//!
//! - **Fixed-window counters** keyed by `(policy, caller)`, in memory
//! - **Background sweep** with an explicit `start`/`stop` lifecycle
//! - **Ordered caller identification**: account id first, network origin second
//! - **Tower layer** that rejects over-quota calls and annotates admitted ones
//! - **Fail-open** when the store itself errors
//! - **Injectable clock** for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust
//! use quotaguard::rate_limit::{Guard, IdentifyChain};
//! use quotaguard::{InMemoryLimitStore, Policy};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryLimitStore::new();
//!     store.start(Duration::from_secs(60)).unwrap();
//!
//!     let policy = Policy::new("write", Duration::from_secs(60), 3).unwrap();
//!     let ids = IdentifyChain::<u64>::new().then(|uid: &u64| Some(format!("user:{uid}")));
//!     let guard = Guard::new(store.clone(), policy, ids);
//!
//!     let result = guard.execute(42, |uid| async move {
//!         // Your handler here
//!         Ok::<_, std::io::Error>(uid)
//!     }).await;
//!
//!     assert_eq!(result.unwrap().quota.map(|q| q.remaining), Some(2));
//!     store.stop();
//! }
//! ```

pub mod clock;
#[cfg(feature = "config")]
pub mod config;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod presets;
pub mod rate_limit;
pub mod telemetry;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(feature = "config")]
pub use config::RateLimitConfig;
pub use error::{AdmissionError, PolicyError, SweepError};
pub use policy::{Policy, PolicySet};
pub use rate_limit::store::CounterEntry;
pub use rate_limit::{
    guard, Admission, Admitted, Decision, Guard, InMemoryLimitStore, LimitStore, Quota,
    RateLimitLayer, Rejection,
};
