use crate::clock::{Clock, SystemClock};
use crate::error::SweepError;
use crate::rate_limit::{ceil_secs, Decision, LimitStore};
use crate::Policy;
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Counter for one `(policy, identifier)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// Attempts registered in the current window, rejected ones included.
    pub count: u64,
    /// Epoch millis at which the window ends.
    pub reset_at_millis: u64,
}

impl CounterEntry {
    fn fresh(now: u64, policy: &Policy) -> Self {
        Self { count: 0, reset_at_millis: now.saturating_add(policy.window_millis()) }
    }

    /// An entry whose window ended at or before `now` is treated as absent.
    pub fn is_expired(&self, now: u64) -> bool {
        self.reset_at_millis <= now
    }

    /// Expired, or ending more than one `window` after `now`. The latter only
    /// happens when the wall clock was stepped backwards.
    fn is_stale(&self, now: u64, window_millis: u64) -> bool {
        self.is_expired(now) || self.reset_at_millis - now > window_millis
    }
}

/// In-memory fixed-window store.
///
/// Clones share the same counters. One mutex guards the whole map: the
/// read-check-increment in [`register_attempt`](Self::register_attempt) and the
/// deletes in [`purge_expired`](Self::purge_expired) never interleave.
///
/// Counters live only in this process; several instances of a service each
/// enforce their own quota.
#[derive(Clone, Debug)]
pub struct InMemoryLimitStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: Mutex<HashMap<String, CounterEntry>>,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Default for InMemoryLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLimitStore {
    /// Store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Store driven by `clock` (useful for deterministic tests).
    ///
    /// # Example
    /// ```
    /// use quotaguard::{InMemoryLimitStore, ManualClock, Policy};
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::new(0);
    /// let store = InMemoryLimitStore::with_clock(clock.clone());
    /// let policy = Policy::new("login", Duration::from_secs(60), 1).unwrap();
    ///
    /// assert!(store.register_attempt("ip:10.0.0.1", &policy).is_allowed());
    /// assert!(!store.register_attempt("ip:10.0.0.1", &policy).is_allowed());
    /// clock.advance(Duration::from_secs(60));
    /// assert!(store.register_attempt("ip:10.0.0.1", &policy).is_allowed());
    /// ```
    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                clock: Arc::new(clock),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Register one attempt and decide on it.
    ///
    /// Starts a fresh window when the key is unknown or its window has ended,
    /// then counts the attempt. Attempts over quota are still counted.
    ///
    /// A window that ends more than one policy window from now is restarted
    /// too, so a backwards clock step never stretches a lockout past `window`.
    pub fn register_attempt(&self, identifier: &str, policy: &Policy) -> Decision {
        debug_assert!(!identifier.is_empty(), "identifier must be non-empty");
        let key = policy.key(identifier);
        let mut entries = lock(&self.inner.entries);
        let now = self.inner.clock.now_millis();

        let entry = match entries.entry(key) {
            Entry::Occupied(o) if !o.get().is_stale(now, policy.window_millis()) => o.into_mut(),
            Entry::Occupied(mut o) => {
                o.insert(CounterEntry::fresh(now, policy));
                o.into_mut()
            }
            Entry::Vacant(v) => {
                tracing::trace!(
                    target: "quotaguard::store",
                    policy = policy.name(),
                    identifier,
                    "window opened"
                );
                v.insert(CounterEntry::fresh(now, policy))
            }
        };

        entry.count = entry.count.saturating_add(1);
        let max = u64::from(policy.max_requests());
        if entry.count > max {
            Decision::Denied {
                retry_after_secs: ceil_secs(entry.reset_at_millis.saturating_sub(now)),
                reset_at_millis: entry.reset_at_millis,
            }
        } else {
            Decision::Allowed {
                remaining: u32::try_from(max - entry.count).unwrap_or(0),
                reset_at_millis: entry.reset_at_millis,
            }
        }
    }

    /// Delete every entry whose window has ended. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// Raw entry for `identifier` under `policy`, expired or not.
    pub fn entry(&self, identifier: &str, policy: &Policy) -> Option<CounterEntry> {
        lock(&self.inner.entries).get(&policy.key(identifier)).copied()
    }

    /// Number of tracked keys, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.entries).is_empty()
    }

    /// Forget every counter.
    pub fn clear(&self) {
        lock(&self.inner.entries).clear();
    }

    /// Start the background sweep, purging expired entries every `every`.
    ///
    /// Must be called from within a tokio runtime. Calling it while a sweep is
    /// already running is a no-op. The task holds only a weak reference and ends
    /// once the last store handle is dropped.
    pub fn start(&self, every: Duration) -> Result<(), SweepError> {
        if every.is_zero() {
            return Err(SweepError::ZeroInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SweepError::NoRuntime)?;

        let mut slot = lock(&self.inner.sweeper);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!(target: "quotaguard::store", "sweep already running");
            return Ok(());
        }

        let weak = Arc::downgrade(&self.inner);
        *slot = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let removed = inner.purge_expired();
                if removed > 0 {
                    tracing::debug!(target: "quotaguard::store", removed, "swept expired windows");
                }
            }
        }));
        tracing::debug!(target: "quotaguard::store", interval = ?every, "sweep started");
        Ok(())
    }

    /// Stop the background sweep, if running.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.inner.sweeper).take() {
            handle.abort();
            tracing::debug!(target: "quotaguard::store", "sweep stopped");
        }
    }

    /// Whether a sweep task is alive.
    pub fn is_sweeping(&self) -> bool {
        lock(&self.inner.sweeper).as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Inner {
    fn purge_expired(&self) -> usize {
        let mut entries = lock(&self.entries);
        let now = self.clock.now_millis();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LimitStore for InMemoryLimitStore {
    type Error = Infallible;

    async fn attempt(&self, identifier: &str, policy: &Policy) -> Result<Decision, Self::Error> {
        Ok(self.register_attempt(identifier, policy))
    }
}

// Counters are plain integers; a panic mid-update cannot leave them torn.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
