//! Caller identification.
//!
//! An [`IdentifyChain`] asks each strategy in order and takes the first identifier
//! it gets. The usual chain prefers the authenticated account and falls back to
//! the network origin:
//!
//! ```
//! use quotaguard::rate_limit::{IdentifyChain, OriginAddr, UserId};
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! struct Req { user: Option<String>, peer: IpAddr }
//!
//! let chain = IdentifyChain::<Req>::new()
//!     .then(UserId::new(|r: &Req| r.user.clone()))
//!     .then(OriginAddr::new(|r: &Req| Some(r.peer)));
//!
//! let peer = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
//! assert_eq!(chain.resolve(&Req { user: Some("42".into()), peer }), "user:42");
//! assert_eq!(chain.resolve(&Req { user: None, peer }), "ip:10.0.0.1");
//! ```
//!
//! The `user:` and `ip:` prefixes keep the two identifier spaces apart.

use std::fmt;
use std::net::IpAddr;

/// Identifier used when no strategy resolves: every unidentifiable caller shares
/// one origin bucket.
pub const ANONYMOUS_ORIGIN: &str = "ip:unknown";

/// One way of deriving an identifier from a request.
///
/// Returning `None` (or an empty string) passes the request to the next strategy.
/// Plain closures `Fn(&Req) -> Option<String>` implement this trait.
pub trait Identify<Req>: Send + Sync {
    fn identify(&self, req: &Req) -> Option<String>;
}

impl<Req, F> Identify<Req> for F
where
    F: Fn(&Req) -> Option<String> + Send + Sync,
{
    fn identify(&self, req: &Req) -> Option<String> {
        self(req)
    }
}

/// Request-side accessors for the standard chain.
pub trait CallerInfo {
    /// Authenticated account id, if any.
    fn user_id(&self) -> Option<&str>;
    /// Network origin of the request, if known.
    fn origin(&self) -> Option<IpAddr>;
}

/// Authenticated account strategy, yielding `user:<id>`.
#[derive(Clone)]
pub struct UserId<F> {
    extract: F,
}

impl<F> UserId<F> {
    pub fn new(extract: F) -> Self {
        Self { extract }
    }
}

impl<Req, F> Identify<Req> for UserId<F>
where
    F: Fn(&Req) -> Option<String> + Send + Sync,
{
    fn identify(&self, req: &Req) -> Option<String> {
        (self.extract)(req).filter(|id| !id.is_empty()).map(|id| format!("user:{id}"))
    }
}

/// Network origin strategy, yielding `ip:<addr>`.
#[derive(Clone)]
pub struct OriginAddr<F> {
    extract: F,
}

impl<F> OriginAddr<F> {
    pub fn new(extract: F) -> Self {
        Self { extract }
    }
}

impl<Req, F> Identify<Req> for OriginAddr<F>
where
    F: Fn(&Req) -> Option<IpAddr> + Send + Sync,
{
    fn identify(&self, req: &Req) -> Option<String> {
        (self.extract)(req).map(|addr| format!("ip:{addr}"))
    }
}

/// Ordered identification strategies; the first success wins.
pub struct IdentifyChain<Req> {
    strategies: Vec<Box<dyn Identify<Req>>>,
}

impl<Req> IdentifyChain<Req> {
    /// Empty chain; resolves everything to [`ANONYMOUS_ORIGIN`].
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    /// Append a strategy with lower precedence than those already added.
    pub fn then<I>(mut self, strategy: I) -> Self
    where
        I: Identify<Req> + 'static,
    {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Identifier for `req`, never empty.
    pub fn resolve(&self, req: &Req) -> String {
        self.identify(req).unwrap_or_else(|| {
            tracing::debug!(
                target: "quotaguard::guard",
                fallback = ANONYMOUS_ORIGIN,
                "no identification strategy matched"
            );
            ANONYMOUS_ORIGIN.to_string()
        })
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<Req: CallerInfo + 'static> IdentifyChain<Req> {
    /// Account id first, network origin second.
    pub fn standard() -> Self {
        Self::new()
            .then(UserId::new(|r: &Req| r.user_id().map(str::to_owned)))
            .then(OriginAddr::new(|r: &Req| r.origin()))
    }
}

impl<Req> Identify<Req> for IdentifyChain<Req> {
    fn identify(&self, req: &Req) -> Option<String> {
        self.strategies
            .iter()
            .filter_map(|s| s.identify(req))
            .find(|id| !id.is_empty())
    }
}

impl<Req> Default for IdentifyChain<Req> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req> fmt::Debug for IdentifyChain<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyChain").field("strategies", &self.strategies.len()).finish()
    }
}
