use crate::error::AdmissionError;
use crate::rate_limit::identify::IdentifyChain;
use crate::rate_limit::{Decision, LimitStore, Quota, Rejection};
use crate::telemetry::{emit_best_effort, AdmissionEvent, NullSink, TelemetrySink};
use crate::Policy;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// The guard's verdict on one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed. `None` when the store failed and the guard failed open.
    Admitted(Option<Quota>),
    /// Over quota.
    Rejected(Rejection),
}

impl Admission {
    /// Whether the call may proceed.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// A handler's response, annotated with the caller's remaining budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted<T> {
    /// What the wrapped handler returned.
    pub response: T,
    /// Quota after this call; `None` if the store was unavailable.
    pub quota: Option<Quota>,
}

impl<T> Admitted<T> {
    /// Drop the quota metadata.
    pub fn into_inner(self) -> T {
        self.response
    }

    /// Transform the response, keeping the quota.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Admitted<U> {
        Admitted { response: f(self.response), quota: self.quota }
    }
}

/// Admission check for one policy.
///
/// Identifies the caller, registers the attempt with the store, and turns the
/// store's [`Decision`] into an [`Admission`]. If the store errors, the guard logs
/// it and admits the call: a broken limiter must not take the endpoint down
/// with it.
///
/// Clones share the store, policy, and identification chain.
pub struct Guard<S, Req, K = NullSink> {
    store: Arc<S>,
    policy: Policy,
    identify: Arc<IdentifyChain<Req>>,
    sink: K,
}

impl<S, Req> Guard<S, Req, NullSink> {
    /// Guard `policy` with `store`, identifying callers through `identify`.
    pub fn new(store: S, policy: Policy, identify: IdentifyChain<Req>) -> Self {
        Self { store: Arc::new(store), policy, identify: Arc::new(identify), sink: NullSink }
    }
}

impl<S, Req, K> Guard<S, Req, K> {
    /// Emit an [`AdmissionEvent`] per decision to `sink`.
    pub fn with_sink<K2>(self, sink: K2) -> Guard<S, Req, K2> {
        Guard { store: self.store, policy: self.policy, identify: self.identify, sink }
    }

    /// The enforced policy.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identifier for `req`; falls back to the anonymous origin, never empty.
    pub fn identify(&self, req: &Req) -> String {
        self.identify.resolve(req)
    }

    /// Wrap this guard in a tower layer.
    pub fn into_layer(self) -> RateLimitLayer<S, Req, K> {
        RateLimitLayer { guard: self }
    }
}

impl<S, Req, K> Guard<S, Req, K>
where
    S: LimitStore,
    K: TelemetrySink + Sync,
    K::Future: Send + 'static,
{
    /// Register one attempt by `identifier` and decide.
    pub async fn check(&self, identifier: &str) -> Admission {
        let policy = self.policy.name();
        let limit = self.policy.max_requests();

        match self.store.attempt(identifier, &self.policy).await {
            Ok(Decision::Allowed { remaining, reset_at_millis }) => {
                tracing::debug!(target: "quotaguard::guard", policy, identifier, remaining, "admitted");
                self.emit(AdmissionEvent::Admitted {
                    policy: policy.to_string(),
                    identifier: identifier.to_string(),
                    remaining,
                })
                .await;
                Admission::Admitted(Some(Quota { limit, remaining, reset_at_millis }))
            }
            Ok(Decision::Denied { retry_after_secs, reset_at_millis }) => {
                tracing::warn!(
                    target: "quotaguard::guard",
                    policy,
                    identifier,
                    limit,
                    retry_after_secs,
                    "rate limit exceeded"
                );
                self.emit(AdmissionEvent::Rejected {
                    policy: policy.to_string(),
                    identifier: identifier.to_string(),
                    retry_after_secs,
                })
                .await;
                Admission::Rejected(Rejection { limit, remaining: 0, reset_at_millis, retry_after_secs })
            }
            Err(e) => {
                tracing::error!(
                    target: "quotaguard::guard",
                    policy,
                    identifier,
                    error = %e,
                    "limit store failed; admitting request"
                );
                self.emit(AdmissionEvent::StoreFailed {
                    policy: policy.to_string(),
                    identifier: identifier.to_string(),
                    error: e.to_string(),
                })
                .await;
                Admission::Admitted(None)
            }
        }
    }

    /// Guard a single call: run `operation` only if `req` is admitted.
    ///
    /// # Errors
    /// Returns `AdmissionError::Rejected` if the caller is over quota.
    /// Returns `AdmissionError::Inner(E)` if the operation itself fails.
    pub async fn execute<T, E, Fut, Op>(
        &self,
        req: Req,
        operation: Op,
    ) -> Result<Admitted<T>, AdmissionError<E>>
    where
        Op: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let identifier = self.identify(&req);
        match self.check(&identifier).await {
            Admission::Rejected(rejection) => Err(AdmissionError::Rejected(rejection)),
            Admission::Admitted(quota) => operation(req)
                .await
                .map(|response| Admitted { response, quota })
                .map_err(AdmissionError::Inner),
        }
    }

    async fn emit(&self, event: AdmissionEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }
}

impl<S, Req, K: Clone> Clone for Guard<S, Req, K> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy.clone(),
            identify: self.identify.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S, Req, K> fmt::Debug for Guard<S, Req, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("policy", &self.policy)
            .field("identify", &self.identify)
            .finish_non_exhaustive()
    }
}

/// Build a rate limit layer for `policy` backed by `store`.
///
/// # Example
/// ```
/// use quotaguard::rate_limit::{guard, CallerInfo, IdentifyChain};
/// use quotaguard::{presets, InMemoryLimitStore};
/// use std::net::IpAddr;
/// use tower::{service_fn, ServiceBuilder, ServiceExt};
///
/// struct Login { user: Option<String>, peer: Option<IpAddr> }
/// impl CallerInfo for Login {
///     fn user_id(&self) -> Option<&str> { self.user.as_deref() }
///     fn origin(&self) -> Option<IpAddr> { self.peer }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let svc = ServiceBuilder::new()
///     .layer(guard(InMemoryLimitStore::new(), presets::auth(), IdentifyChain::<Login>::standard()))
///     .service(service_fn(|_req: Login| async { Ok::<_, std::io::Error>("welcome") }));
///
/// let out = svc
///     .oneshot(Login { user: None, peer: "10.0.0.1".parse().ok() })
///     .await
///     .unwrap();
/// assert_eq!(out.response, "welcome");
/// assert_eq!(out.quota.map(|q| q.remaining), Some(4));
/// # }
/// ```
pub fn guard<S, Req>(
    store: S,
    policy: Policy,
    identify: IdentifyChain<Req>,
) -> RateLimitLayer<S, Req> {
    Guard::new(store, policy, identify).into_layer()
}

/// A layer that enforces a rate limit policy using a [`LimitStore`].
pub struct RateLimitLayer<S, Req, K = NullSink> {
    guard: Guard<S, Req, K>,
}

impl<S, Req, K> RateLimitLayer<S, Req, K> {
    /// Layer around an existing guard.
    pub fn new(guard: Guard<S, Req, K>) -> Self {
        Self { guard }
    }

    /// Emit an [`AdmissionEvent`] per decision to `sink`.
    pub fn with_sink<K2>(self, sink: K2) -> RateLimitLayer<S, Req, K2> {
        RateLimitLayer { guard: self.guard.with_sink(sink) }
    }

    /// The guard applied by every service this layer builds.
    pub fn guard(&self) -> &Guard<S, Req, K> {
        &self.guard
    }
}

impl<S, Req, K: Clone> Clone for RateLimitLayer<S, Req, K> {
    fn clone(&self) -> Self {
        Self { guard: self.guard.clone() }
    }
}

impl<S, Req, K> fmt::Debug for RateLimitLayer<S, Req, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitLayer").field("guard", &self.guard).finish()
    }
}

impl<Svc, S, Req, K: Clone> Layer<Svc> for RateLimitLayer<S, Req, K> {
    type Service = RateLimitService<Svc, S, Req, K>;

    fn layer(&self, service: Svc) -> Self::Service {
        RateLimitService { inner: service, guard: self.guard.clone() }
    }
}

/// Middleware service that enforces a rate limit policy.
pub struct RateLimitService<Svc, S, Req, K = NullSink> {
    inner: Svc,
    guard: Guard<S, Req, K>,
}

impl<Svc: Clone, S, Req, K: Clone> Clone for RateLimitService<Svc, S, Req, K> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), guard: self.guard.clone() }
    }
}

impl<Svc, S, Req, K> fmt::Debug for RateLimitService<Svc, S, Req, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitService").field("guard", &self.guard).finish_non_exhaustive()
    }
}

impl<Svc, S, Req, K> Service<Req> for RateLimitService<Svc, S, Req, K>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Future: Send + 'static,
    S: LimitStore + 'static,
    Req: Send + 'static,
    K: TelemetrySink + Sync,
    K::Future: Send + 'static,
{
    type Response = Admitted<Svc::Response>;
    type Error = AdmissionError<Svc::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(AdmissionError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let guard = self.guard.clone();
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let identifier = guard.identify(&req);

        Box::pin(async move {
            match guard.check(&identifier).await {
                Admission::Rejected(rejection) => Err(AdmissionError::Rejected(rejection)),
                Admission::Admitted(quota) => inner
                    .call(req)
                    .await
                    .map(|response| Admitted { response, quota })
                    .map_err(AdmissionError::Inner),
            }
        })
    }
}
