//! Named admission policies.
//!
//! A [`Policy`] is a validated `(window, max_requests)` pair with a name. The name
//! scopes the counters: the same caller is tracked independently under every
//! policy it hits. Validation happens here, once, so the store never sees a
//! zero window or a zero quota.

use crate::error::PolicyError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Validated admission rule: at most `max_requests` attempts per `window`.
///
/// Cloning is cheap; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Policy {
    name: Arc<str>,
    window: Duration,
    max_requests: u32,
}

impl Policy {
    /// Create a policy, validating all fields.
    ///
    /// Errors if `name` is empty or contains `:`, if `window` is under one
    /// millisecond, or if `max_requests` is zero.
    ///
    /// # Examples
    /// ```
    /// use quotaguard::Policy;
    /// use std::time::Duration;
    /// let login = Policy::new("login", Duration::from_secs(60), 5).unwrap();
    /// assert_eq!(login.max_requests(), 5);
    /// ```
    pub fn new(
        name: impl Into<String>,
        window: Duration,
        max_requests: u32,
    ) -> Result<Self, PolicyError> {
        let name = name.into();
        if name.is_empty() || name.contains(':') {
            return Err(PolicyError::InvalidName { name });
        }
        if window.as_millis() == 0 {
            return Err(PolicyError::ZeroWindow { policy: name });
        }
        if max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests { policy: name });
        }
        Ok(Self { name: name.into(), window, max_requests })
    }

    /// Built-in policy whose values are known to be valid.
    pub(crate) fn preset(name: &'static str, window: Duration, max_requests: u32) -> Self {
        debug_assert!(Self::new(name, window, max_requests).is_ok(), "invalid preset {name}");
        Self { name: name.into(), window, max_requests }
    }

    /// Policy name, used as the counter key prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole milliseconds.
    pub fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }

    /// Attempts admitted per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Counter key for `identifier` under this policy.
    pub(crate) fn key(&self, identifier: &str) -> String {
        let mut key = String::with_capacity(self.name.len() + 1 + identifier.len());
        key.push_str(&self.name);
        key.push(':');
        key.push_str(identifier);
        key
    }
}

/// Named, validated collection of policies.
///
/// Iteration is ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: BTreeMap<String, Policy>,
}

impl PolicySet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in presets: `auth`, `password_reset`, `read`, `registration`, `write`.
    pub fn defaults() -> Self {
        let mut set = Self::new();
        for policy in crate::presets::all() {
            set.policies.insert(policy.name().to_string(), policy);
        }
        set
    }

    /// Build a set from policies, rejecting duplicate names.
    pub fn from_policies<I>(policies: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = Policy>,
    {
        let mut set = Self::new();
        for policy in policies {
            set.insert(policy)?;
        }
        Ok(set)
    }

    /// Add a policy; errors if the name is taken.
    pub fn insert(&mut self, policy: Policy) -> Result<(), PolicyError> {
        if self.policies.contains_key(policy.name()) {
            return Err(PolicyError::Duplicate { name: policy.name().to_string() });
        }
        self.policies.insert(policy.name().to_string(), policy);
        Ok(())
    }

    /// Add or replace a policy, returning the previous one.
    pub fn replace(&mut self, policy: Policy) -> Option<Policy> {
        self.policies.insert(policy.name().to_string(), policy)
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_window() {
        let err = Policy::new("auth", Duration::ZERO, 5).expect_err("zero window is invalid");
        assert!(matches!(err, PolicyError::ZeroWindow { ref policy } if policy == "auth"));
    }

    #[test]
    fn rejects_sub_millisecond_window() {
        let err = Policy::new("auth", Duration::from_micros(500), 5)
            .expect_err("window below 1ms rounds to zero");
        assert!(matches!(err, PolicyError::ZeroWindow { .. }));
    }

    #[test]
    fn rejects_zero_max_requests() {
        let err = Policy::new("auth", Duration::from_secs(1), 0).expect_err("zero quota is invalid");
        assert!(matches!(err, PolicyError::ZeroMaxRequests { .. }));
    }

    #[test]
    fn rejects_bad_names() {
        assert!(matches!(
            Policy::new("", Duration::from_secs(1), 1),
            Err(PolicyError::InvalidName { .. })
        ));
        assert!(matches!(
            Policy::new("a:b", Duration::from_secs(1), 1),
            Err(PolicyError::InvalidName { ref name }) if name == "a:b"
        ));
    }

    #[test]
    fn key_is_scoped_by_policy_name() {
        let p = Policy::new("write", Duration::from_secs(60), 10).unwrap();
        assert_eq!(p.key("user:42"), "write:user:42");
        assert_eq!(p.window_millis(), 60_000);
    }

    #[test]
    fn set_rejects_duplicates() {
        let a = Policy::new("a", Duration::from_secs(1), 1).unwrap();
        let mut set = PolicySet::from_policies([a.clone()]).unwrap();
        let err = set.insert(a.clone()).unwrap_err();
        assert_eq!(err, PolicyError::Duplicate { name: "a".into() });

        let wider = Policy::new("a", Duration::from_secs(2), 1).unwrap();
        assert_eq!(set.replace(wider.clone()), Some(a));
        assert_eq!(set.get("a"), Some(&wider));
    }

    #[test]
    fn defaults_hold_every_preset_in_name_order() {
        let set = PolicySet::defaults();
        let names: Vec<_> = set.iter().map(Policy::name).collect();
        assert_eq!(names, ["auth", "password_reset", "read", "registration", "write"]);
        assert_eq!(set.len(), 5);
        assert!(!set.is_empty());
    }
}
