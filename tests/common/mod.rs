#![allow(dead_code)]

use quotaguard::rate_limit::CallerInfo;
use quotaguard::{Decision, LimitStore, Policy};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const T0: u64 = 1_700_000_000_000;

/// Minimal HTTP-ish request for the standard identification chain.
#[derive(Debug, Clone)]
pub struct Request {
    pub path: &'static str,
    pub user: Option<String>,
    pub peer: Option<IpAddr>,
}

impl Request {
    pub fn anonymous(peer: &str) -> Self {
        Self { path: "/", user: None, peer: peer.parse().ok() }
    }

    pub fn user(id: &str, peer: &str) -> Self {
        Self { path: "/", user: Some(id.to_string()), peer: peer.parse().ok() }
    }

    pub fn unknown() -> Self {
        Self { path: "/", user: None, peer: None }
    }
}

impl CallerInfo for Request {
    fn user_id(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn origin(&self) -> Option<IpAddr> {
        self.peer
    }
}

#[derive(Debug, thiserror::Error)]
#[error("backend unreachable")]
pub struct Unreachable;

/// A store whose every call fails, counting how often it was asked.
#[derive(Clone, Default)]
pub struct FailingStore {
    pub calls: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LimitStore for FailingStore {
    type Error = Unreachable;

    async fn attempt(&self, _identifier: &str, _policy: &Policy) -> Result<Decision, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Unreachable)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

/// Handler that echoes the request path and counts calls.
#[derive(Clone, Default)]
pub struct Echo {
    pub hits: Arc<AtomicUsize>,
}

impl Echo {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl tower::Service<Request> for Echo {
    type Response = &'static str;
    type Error = std::io::Error;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        self.hits.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(Ok(req.path))
    }
}
