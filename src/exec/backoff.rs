//! Adaptive per-route connection throttling.

use crate::base::neterror::{NetError, TransportKind};
use crate::exec::context::ExecContext;
use crate::exec::ExecChain;
use crate::http::request::ExecRequest;
use crate::http::response::HttpResponse;
use crate::route::plan::Route;
use crate::socket::pool::PoolControl;
use dashmap::DashMap;
use futures::future::BoxFuture;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Decides whether an outcome looks like the route is overloaded.
pub trait BackoffStrategy: Send + Sync {
    fn should_backoff_error(&self, error: &NetError) -> bool;
    fn should_backoff_response(&self, response: &HttpResponse) -> bool;
}

/// Refused or timed-out connections, and 429/503 responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackoffStrategy;

impl BackoffStrategy for DefaultBackoffStrategy {
    fn should_backoff_error(&self, error: &NetError) -> bool {
        matches!(
            error.transport_kind(),
            Some(TransportKind::ConnectRefused | TransportKind::ConnectTimeout | TransportKind::SocketTimeout)
        )
    }

    fn should_backoff_response(&self, response: &HttpResponse) -> bool {
        matches!(response.status(), StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Shared per-route throttle, updated concurrently by in-flight calls.
pub trait BackoffManager: Send + Sync {
    /// The route looks overloaded.
    fn backoff(&self, route: &Route);
    /// The route answered cleanly.
    fn probe(&self, route: &Route);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackoffManager;

impl BackoffManager for NoopBackoffManager {
    fn backoff(&self, _route: &Route) {}
    fn probe(&self, _route: &Route) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AimdConfig {
    /// Minimum time between two adjustments of the same route.
    pub cool_down: Duration,
    /// Multiplier applied to the limit on backoff.
    pub backoff_factor: f64,
    /// Limit a route recovers to at most.
    pub cap: usize,
}

impl Default for AimdConfig {
    fn default() -> Self {
        Self { cool_down: Duration::from_secs(5), backoff_factor: 0.5, cap: 6 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RouteRecord {
    last_backoff: Option<Instant>,
    last_probe: Option<Instant>,
}

fn within(last: Option<Instant>, now: Instant, window: Duration) -> bool {
    last.is_some_and(|at| now.duration_since(at) < window)
}

/// Additive-increase / multiplicative-decrease of the pool's per-route
/// limit. Each route adjusts at most once per cool-down.
pub struct AimdBackoffManager {
    pool: Arc<dyn PoolControl>,
    config: AimdConfig,
    records: DashMap<Route, RouteRecord>,
}

impl AimdBackoffManager {
    pub fn new(pool: Arc<dyn PoolControl>) -> Self {
        Self::with_config(pool, AimdConfig::default())
    }

    pub fn with_config(pool: Arc<dyn PoolControl>, config: AimdConfig) -> Self {
        Self { pool, config, records: DashMap::new() }
    }

    /// Routes with backoff history still inside their recovery.
    pub fn tracked_routes(&self) -> usize {
        self.records.len()
    }

    fn backed_off(&self, current: usize) -> usize {
        if current <= 1 {
            return 1;
        }
        ((current as f64 * self.config.backoff_factor).floor() as usize).max(1)
    }
}

impl BackoffManager for AimdBackoffManager {
    fn backoff(&self, route: &Route) {
        let mut record = self.records.entry(route.clone()).or_default();
        let now = Instant::now();
        if within(record.last_backoff, now, self.config.cool_down) {
            return;
        }
        let current = self.pool.max_per_route(route);
        let next = self.backed_off(current);
        self.pool.set_max_per_route(route, next);
        record.last_backoff = Some(now);
        tracing::debug!(route = %route, from = current, to = next, "backing off route");
    }

    fn probe(&self, route: &Route) {
        let current = self.pool.max_per_route(route);
        if current >= self.config.cap {
            // Fully recovered; nothing left to gate.
            self.records.remove(route);
            return;
        }
        let mut record = self.records.entry(route.clone()).or_default();
        let now = Instant::now();
        if within(record.last_probe, now, self.config.cool_down)
            || within(record.last_backoff, now, self.config.cool_down)
        {
            return;
        }
        let next = current + 1;
        self.pool.set_max_per_route(route, next);
        record.last_probe = Some(now);
        tracing::debug!(route = %route, from = current, to = next, "probing route");
    }
}

impl std::fmt::Debug for AimdBackoffManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AimdBackoffManager")
            .field("config", &self.config)
            .field("routes", &self.records.len())
            .finish()
    }
}

/// Reports each outcome to the backoff manager; never retries.
pub struct BackoffExec {
    inner: Arc<dyn ExecChain>,
    strategy: Arc<dyn BackoffStrategy>,
    manager: Arc<dyn BackoffManager>,
}

impl BackoffExec {
    pub fn new(
        inner: Arc<dyn ExecChain>,
        strategy: Arc<dyn BackoffStrategy>,
        manager: Arc<dyn BackoffManager>,
    ) -> Self {
        Self { inner, strategy, manager }
    }
}

impl ExecChain for BackoffExec {
    fn execute<'a>(
        &'a self,
        route: &'a Route,
        request: &'a mut ExecRequest,
        ctx: &'a mut ExecContext,
    ) -> BoxFuture<'a, Result<HttpResponse, NetError>> {
        Box::pin(async move {
            match self.inner.execute(route, request, ctx).await {
                Ok(response) => {
                    if self.strategy.should_backoff_response(&response) {
                        self.manager.backoff(route);
                    } else {
                        self.manager.probe(route);
                    }
                    Ok(response)
                }
                Err(e) => {
                    if self.strategy.should_backoff_error(&e) {
                        self.manager.backoff(route);
                    }
                    Err(e)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::host::HttpHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPool(AtomicUsize);

    impl PoolControl for FixedPool {
        fn max_per_route(&self, _route: &Route) -> usize {
            self.0.load(Ordering::SeqCst)
        }

        fn set_max_per_route(&self, _route: &Route, max: usize) {
            self.0.store(max, Ordering::SeqCst);
        }
    }

    fn route() -> Route {
        Route::direct(HttpHost::http("example.com", 80))
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_halves_once_per_cool_down() {
        let pool = Arc::new(FixedPool(AtomicUsize::new(6)));
        let manager = AimdBackoffManager::new(pool.clone());

        manager.backoff(&route());
        assert_eq!(pool.0.load(Ordering::SeqCst), 3);
        manager.backoff(&route());
        assert_eq!(pool.0.load(Ordering::SeqCst), 3);

        tokio::time::advance(Duration::from_secs(6)).await;
        manager.backoff(&route());
        assert_eq!(pool.0.load(Ordering::SeqCst), 1);
        tokio::time::advance(Duration::from_secs(6)).await;
        manager.backoff(&route());
        assert_eq!(pool.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_recovers_to_cap() {
        let pool = Arc::new(FixedPool(AtomicUsize::new(4)));
        let manager =
            AimdBackoffManager::with_config(pool.clone(), AimdConfig { cap: 5, ..Default::default() });

        manager.backoff(&route());
        manager.probe(&route());
        assert_eq!(pool.0.load(Ordering::SeqCst), 2);

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(6)).await;
            manager.probe(&route());
        }
        assert_eq!(pool.0.load(Ordering::SeqCst), 5);
        assert_eq!(manager.tracked_routes(), 0, "recovered route is forgotten");
    }

    #[test]
    fn test_route_at_cap_keeps_no_record() {
        let pool = Arc::new(FixedPool(AtomicUsize::new(6)));
        let manager = AimdBackoffManager::new(pool.clone());
        for port in 1..=50 {
            manager.probe(&Route::direct(HttpHost::http("example.com", port)));
        }
        assert_eq!(manager.tracked_routes(), 0);
    }

    #[test]
    fn test_default_strategy() {
        let strategy = DefaultBackoffStrategy;
        assert!(strategy.should_backoff_error(&NetError::transport(TransportKind::ConnectRefused, "x")));
        assert!(!strategy.should_backoff_error(&NetError::Aborted));
        assert!(!strategy.should_backoff_error(&NetError::transport(TransportKind::ConnectionReset, "x")));
    }
}
