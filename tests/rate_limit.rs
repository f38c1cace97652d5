use futures::future::join_all;
use quotaguard::{Decision, InMemoryLimitStore, LimitStore, ManualClock, Policy};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const T0: u64 = 1_700_000_000_000;

fn fixture() -> (InMemoryLimitStore, ManualClock) {
    let clock = ManualClock::new(T0);
    (InMemoryLimitStore::with_clock(clock.clone()), clock)
}

fn policy(name: &str, window: Duration, max: u32) -> Policy {
    Policy::new(name, window, max).expect("valid policy")
}

#[test]
fn exactly_max_attempts_fit_in_a_window() {
    for (max, window_ms) in [(1, 1_000), (3, 60_000), (10, 250), (100, 3_600_000)] {
        let (store, clock) = fixture();
        let p = policy("write", Duration::from_millis(window_ms), max);

        for _ in 0..max {
            assert!(store.register_attempt("user:1", &p).is_allowed());
            clock.advance(Duration::from_millis(window_ms / (u64::from(max) + 1)));
        }
        let over = store.register_attempt("user:1", &p);
        assert!(!over.is_allowed(), "attempt {} of max {max} should be denied", max + 1);
        assert!(over.retry_after_secs().unwrap() > 0);
    }
}

#[test]
fn remaining_counts_down_by_one() {
    let (store, _clock) = fixture();
    let p = policy("read", Duration::from_secs(60), 5);
    let seen: Vec<u32> = (0..5).map(|_| store.register_attempt("ip:10.0.0.1", &p).remaining()).collect();
    assert_eq!(seen, [4, 3, 2, 1, 0]);
    assert_eq!(store.register_attempt("ip:10.0.0.1", &p).remaining(), 0);
}

#[test]
fn documented_scenario() {
    let (store, clock) = fixture();
    let p = policy("write", Duration::from_secs(60), 3);
    let reset = T0 + 60_000;

    clock.set(T0);
    assert_eq!(
        store.register_attempt("user:42", &p),
        Decision::Allowed { remaining: 2, reset_at_millis: reset }
    );
    clock.set(T0 + 5_000);
    assert_eq!(store.register_attempt("user:42", &p).remaining(), 1);
    clock.set(T0 + 10_000);
    assert_eq!(store.register_attempt("user:42", &p).remaining(), 0);

    clock.set(T0 + 15_000);
    let fourth = store.register_attempt("user:42", &p);
    assert!(!fourth.is_allowed());
    assert_eq!(fourth.remaining(), 0);
    assert_eq!(fourth.retry_after_secs(), Some(45));

    clock.set(T0 + 61_000);
    let fifth = store.register_attempt("user:42", &p);
    assert!(fifth.is_allowed());
    assert_eq!(fifth.remaining(), 2);
    assert_eq!(fifth.reset_at_millis(), T0 + 121_000);
}

#[test]
fn rollover_starts_a_clean_window() {
    let (store, clock) = fixture();
    let p = policy("auth", Duration::from_secs(10), 2);
    for _ in 0..20 {
        store.register_attempt("user:9", &p);
    }
    clock.advance(Duration::from_secs(10));
    assert_eq!(store.register_attempt("user:9", &p).remaining(), 1);
    assert_eq!(store.entry("user:9", &p).unwrap().count, 1);
}

#[test]
fn exhausting_one_caller_leaves_others_alone() {
    let (store, _clock) = fixture();
    let p = policy("auth", Duration::from_secs(60), 2);
    for _ in 0..5 {
        store.register_attempt("user:a", &p);
    }
    assert!(!store.register_attempt("user:a", &p).is_allowed());
    assert_eq!(store.register_attempt("user:b", &p).remaining(), 1);
    assert_eq!(store.register_attempt("ip:10.0.0.2", &p).remaining(), 1);
}

#[test]
fn policies_count_independently() {
    let (store, _clock) = fixture();
    let auth = policy("auth", Duration::from_secs(60), 1);
    let write = policy("write", Duration::from_secs(60), 2);

    assert!(store.register_attempt("user:1", &auth).is_allowed());
    assert!(!store.register_attempt("user:1", &auth).is_allowed());
    assert_eq!(store.register_attempt("user:1", &write).remaining(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_never_over_admit() {
    let store = InMemoryLimitStore::new();
    let p = policy("burst", Duration::from_secs(3600), 50);

    let handles: Vec<_> = (0..500)
        .map(|_| {
            let store = store.clone();
            let p = p.clone();
            tokio::spawn(async move { store.attempt("user:1", &p).await.unwrap().is_allowed() })
        })
        .collect();

    let admitted = join_all(handles).await.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(admitted, 50);
}

#[test]
fn concurrent_threads_never_over_admit() {
    let store = InMemoryLimitStore::new();
    let p = policy("burst", Duration::from_secs(3600), 7);
    let start = Arc::new(Barrier::new(16));

    let threads: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            let p = p.clone();
            let start = start.clone();
            std::thread::spawn(move || {
                start.wait();
                (0..4).filter(|_| store.register_attempt("ip:10.9.9.9", &p).is_allowed()).count()
            })
        })
        .collect();

    let admitted: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
    assert_eq!(admitted, 7);
    assert_eq!(store.entry("ip:10.9.9.9", &p).unwrap().count, 64);
}

#[tokio::test(start_paused = true)]
async fn background_sweep_reclaims_idle_callers() {
    let (store, clock) = fixture();
    let short = policy("auth", Duration::from_secs(30), 5);
    let long = policy("read", Duration::from_secs(3600), 5);
    for n in 0..100 {
        store.register_attempt(&format!("ip:10.0.0.{n}"), &short);
    }
    store.register_attempt("user:1", &long);
    store.start(Duration::from_secs(60)).unwrap();

    clock.advance(Duration::from_secs(31));
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(store.len(), 1);
    assert!(store.entry("user:1", &long).is_some());
    store.stop();
}
