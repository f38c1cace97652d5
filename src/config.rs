//! Serde-backed configuration (feature `config`).
//!
//! ```json
//! {
//!   "sweep_interval_ms": 30000,
//!   "policies": {
//!     "auth":  { "window_ms": 900000, "max_requests": 5 },
//!     "write": { "window_ms": 60000,  "max_requests": 30 }
//!   }
//! }
//! ```
//!
//! Everything is validated on load; a config that parses is safe to hand to the
//! store and guards.

use crate::error::PolicyError;
use crate::{Policy, PolicySet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

fn default_sweep_interval_ms() -> u64 {
    DEFAULT_SWEEP_INTERVAL_MS
}

/// One policy as written in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySpec {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Attempts admitted per window.
    pub max_requests: u32,
}

/// Top-level rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// How often the store purges expired windows.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Policies by name.
    #[serde(default)]
    pub policies: BTreeMap<String, PolicySpec>,
}

impl Default for RateLimitConfig {
    /// Default sweep interval and the built-in presets.
    fn default() -> Self {
        let policies = crate::presets::all()
            .iter()
            .map(|p| {
                (
                    p.name().to_string(),
                    PolicySpec { window_ms: p.window_millis(), max_requests: p.max_requests() },
                )
            })
            .collect();
        Self { sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS, policies }
    }
}

impl RateLimitConfig {
    /// Parse and validate JSON.
    pub fn from_json(text: &str) -> Result<Self, PolicyError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| PolicyError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String, PolicyError> {
        serde_json::to_string_pretty(self).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    /// `sweep_interval_ms` as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Check every field without building anything.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.sweep_interval_ms == 0 {
            return Err(PolicyError::Parse("sweep_interval_ms must be > 0".into()));
        }
        self.policies().map(|_| ())
    }

    /// Build the validated policy set.
    pub fn policies(&self) -> Result<PolicySet, PolicyError> {
        PolicySet::from_policies(
            self.policies
                .iter()
                .map(|(name, spec)| {
                    Policy::new(name.as_str(), Duration::from_millis(spec.window_ms), spec.max_requests)
                })
                .collect::<Result<Vec<_>, _>>()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_builds_policies() {
        let cfg = RateLimitConfig::from_json(
            r#"{
                "sweep_interval_ms": 5000,
                "policies": {
                    "auth": { "window_ms": 900000, "max_requests": 5 },
                    "read": { "window_ms": 60000, "max_requests": 100 }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(5));

        let set = cfg.policies().unwrap();
        let auth = set.get("auth").unwrap();
        assert_eq!(auth.window(), Duration::from_secs(900));
        assert_eq!(auth.max_requests(), 5);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn sweep_interval_defaults() {
        let cfg = RateLimitConfig::from_json(r#"{ "policies": {} }"#).unwrap();
        assert_eq!(cfg.sweep_interval_ms, 60_000);
        assert!(cfg.policies().unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_policy_values() {
        let err = RateLimitConfig::from_json(
            r#"{ "policies": { "auth": { "window_ms": 0, "max_requests": 5 } } }"#,
        )
        .unwrap_err();
        assert_eq!(err, PolicyError::ZeroWindow { policy: "auth".into() });

        let err = RateLimitConfig::from_json(
            r#"{ "policies": { "auth": { "window_ms": 1000, "max_requests": 0 } } }"#,
        )
        .unwrap_err();
        assert_eq!(err, PolicyError::ZeroMaxRequests { policy: "auth".into() });

        let err = RateLimitConfig::from_json(
            r#"{ "policies": { "a:b": { "window_ms": 1000, "max_requests": 1 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidName { .. }));
    }

    #[test]
    fn rejects_malformed_json_and_unknown_fields() {
        assert!(matches!(RateLimitConfig::from_json("{"), Err(PolicyError::Parse(_))));
        assert!(matches!(
            RateLimitConfig::from_json(r#"{ "sweep_every": 10 }"#),
            Err(PolicyError::Parse(_))
        ));
        assert!(matches!(
            RateLimitConfig::from_json(r#"{ "sweep_interval_ms": 0 }"#),
            Err(PolicyError::Parse(_))
        ));
    }

    #[test]
    fn default_round_trips_to_the_presets() {
        let cfg = RateLimitConfig::default();
        let reparsed = RateLimitConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, cfg);
        assert_eq!(reparsed.policies().unwrap(), PolicySet::defaults());
    }
}
