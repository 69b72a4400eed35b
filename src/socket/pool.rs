use crate::base::cancel::bounded;
use crate::base::neterror::{NetError, TransportKind};
use crate::route::plan::Route;
use crate::socket::connection::{
    AffinityToken, ConnectionFactory, ConnectionManager, Lease, ManagedConnection,
};
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Pool limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections per route, leased plus idle.
    pub max_per_route: usize,
    /// Connections across all routes.
    pub max_total: usize,
    /// Longest an idle connection is kept; `None` keeps it until the
    /// keep-alive duration from the response runs out.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_per_route: 6, max_total: 256, idle_timeout: Some(Duration::from_secs(300)) }
    }
}

/// Per-route capacity control, used by the backoff layer.
pub trait PoolControl: Send + Sync {
    fn max_per_route(&self, route: &Route) -> usize;
    fn set_max_per_route(&self, route: &Route, max: usize);
}

/// Snapshot of one route's (or the whole pool's) occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub leased: usize,
    pub available: usize,
    pub pending: usize,
    pub max: usize,
}

/// Idle connection with its affinity and expiry.
struct IdleConnection {
    id: u64,
    connection: Box<dyn ManagedConnection>,
    state: Option<AffinityToken>,
    idle_since: Instant,
    expiry: Option<Instant>,
}

impl IdleConnection {
    fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|at| at <= now)
    }
}

/// A lease request waiting for capacity.
struct Waiter {
    state: Option<AffinityToken>,
    sender: oneshot::Sender<Lease>,
}

/// Per-route state tracking.
struct RouteGroup {
    available: VecDeque<IdleConnection>,
    leased: usize,
    waiters: VecDeque<Waiter>,
    max: Option<usize>,
}

impl RouteGroup {
    fn new() -> Self {
        Self { available: VecDeque::new(), leased: 0, waiters: VecDeque::new(), max: None }
    }

    fn allocated(&self) -> usize {
        self.leased + self.available.len()
    }

    /// Nothing held, nothing waiting, and no limit beyond the default.
    fn is_unused(&self, default_max: usize) -> bool {
        self.allocated() == 0 && self.waiters.is_empty() && self.max.map_or(true, |max| max == default_max)
    }
}

/// Route-keyed connection pool with affinity-aware reuse.
///
/// Idle connections are reused most-recently-released first. A request
/// carrying an affinity token gets a connection tagged with the same
/// token, else an untagged one, else a fresh one. Requests beyond the
/// limits wait in FIFO order.
pub struct RoutePool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    groups: Arc<DashMap<Route, RouteGroup>>,
    total: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl Clone for RoutePool {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            factory: Arc::clone(&self.factory),
            groups: Arc::clone(&self.groups),
            total: Arc::clone(&self.total),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl std::fmt::Debug for RoutePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePool")
            .field("config", &self.config)
            .field("total", &self.total.load(Ordering::Relaxed))
            .finish()
    }
}

impl RoutePool {
    pub fn new(factory: impl ConnectionFactory + 'static) -> Self {
        Self::with_config(factory, PoolConfig::default())
    }

    pub fn with_config(factory: impl ConnectionFactory + 'static, config: PoolConfig) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            groups: Arc::new(DashMap::new()),
            total: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn route_max(&self, group: &RouteGroup) -> usize {
        group.max.unwrap_or(self.config.max_per_route)
    }

    fn discard(&self, mut idle: IdleConnection) {
        idle.connection.shutdown();
        self.total.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(lease = idle.id, "closed idle connection");
    }

    fn purge_expired(&self, group: &mut RouteGroup, now: Instant) {
        let (expired, kept): (VecDeque<_>, VecDeque<_>) =
            group.available.drain(..).partition(|idle| idle.is_expired(now));
        group.available = kept;
        for idle in expired {
            self.discard(idle);
        }
    }

    /// Lease from the group without waiting, if the limits allow.
    fn try_acquire(
        &self,
        group: &mut RouteGroup,
        route: &Route,
        state: Option<&AffinityToken>,
    ) -> Option<Lease> {
        self.purge_expired(group, Instant::now());

        let matching = group
            .available
            .iter()
            .position(|idle| idle.state.as_ref() == state)
            .or_else(|| {
                state.and_then(|_| group.available.iter().position(|idle| idle.state.is_none()))
            });
        if let Some(idle) = matching.and_then(|idx| group.available.remove(idx)) {
            group.leased += 1;
            tracing::debug!(route = %route, lease = idle.id, "leased pooled connection");
            return Some(Lease::new(idle.id, route.clone(), idle.connection, idle.state, true));
        }

        let max = self.route_max(group);
        // Make room by closing idle connections held for other principals.
        while (group.allocated() >= max || self.total.load(Ordering::Relaxed) >= self.config.max_total)
            && group.leased < max
        {
            match group.available.pop_back() {
                Some(idle) => self.discard(idle),
                None => break,
            }
        }
        if group.allocated() >= max || self.total.load(Ordering::Relaxed) >= self.config.max_total {
            return None;
        }

        group.leased += 1;
        self.total.fetch_add(1, Ordering::Relaxed);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(route = %route, lease = id, "leased new connection");
        Some(Lease::new(id, route.clone(), self.factory.create(route), None, false))
    }

    /// Return a lease that was never handed to its waiter.
    fn restore(&self, group: &mut RouteGroup, lease: Lease) {
        group.leased = group.leased.saturating_sub(1);
        let id = lease.id();
        let (_, connection, state) = lease.into_parts();
        if connection.is_open() {
            let now = Instant::now();
            group.available.push_front(IdleConnection {
                id,
                connection,
                state,
                idle_since: now,
                expiry: self.config.idle_timeout.map(|t| now + t),
            });
        } else {
            self.total.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Hand freed capacity to waiters, oldest first.
    fn dispatch(&self, group: &mut RouteGroup, route: &Route) {
        while let Some(waiter) = group.waiters.pop_front() {
            if waiter.sender.is_closed() {
                continue;
            }
            match self.try_acquire(group, route, waiter.state.as_ref()) {
                Some(lease) => {
                    if let Err(lease) = waiter.sender.send(lease) {
                        self.restore(group, lease);
                    }
                }
                None => {
                    group.waiters.push_front(waiter);
                    break;
                }
            }
        }
    }

    /// The group's next waiter is held back by the total limit alone.
    fn starved(&self, group: &RouteGroup) -> bool {
        !group.waiters.is_empty()
            && group.available.is_empty()
            && group.leased < self.route_max(group)
            && self.total.load(Ordering::Relaxed) >= self.config.max_total
    }

    /// Close the least recently used idle connection of any other route.
    fn evict_idle_elsewhere(&self, route: &Route) -> bool {
        let oldest = self
            .groups
            .iter()
            .filter(|entry| entry.key() != route)
            .filter_map(|entry| {
                let idle = entry.available.iter().min_by_key(|idle| idle.idle_since)?;
                Some((idle.idle_since, idle.id, entry.key().clone()))
            })
            .min_by_key(|(since, _, _)| *since);
        let Some((_, id, owner)) = oldest else {
            return false;
        };

        let Some(mut group) = self.groups.get_mut(&owner) else {
            return false;
        };
        let position = group.available.iter().position(|idle| idle.id == id);
        let Some(idle) = position.and_then(|idx| group.available.remove(idx)) else {
            return false;
        };
        tracing::debug!(route = %owner, lease = id, waiting = %route, "closing idle connection for another route");
        self.discard(idle);
        true
    }

    /// Serve waiters on every route, closing idle connections elsewhere
    /// when only the total limit is in the way. No group may be locked by
    /// the caller.
    fn dispatch_pending(&self) {
        let routes: Vec<Route> = self
            .groups
            .iter()
            .filter(|entry| !entry.waiters.is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        for route in routes {
            loop {
                let starved = match self.groups.get_mut(&route) {
                    Some(mut group) => {
                        self.dispatch(&mut group, &route);
                        self.starved(&group)
                    }
                    None => false,
                };
                if !starved || !self.evict_idle_elsewhere(&route) {
                    break;
                }
            }
        }
    }

    pub fn stats(&self, route: &Route) -> PoolStats {
        match self.groups.get(route) {
            Some(group) => PoolStats {
                leased: group.leased,
                available: group.available.len(),
                pending: group.waiters.len(),
                max: self.route_max(&group),
            },
            None => PoolStats { max: self.config.max_per_route, ..PoolStats::default() },
        }
    }

    pub fn total_stats(&self) -> PoolStats {
        let mut stats = PoolStats { max: self.config.max_total, ..PoolStats::default() };
        for group in self.groups.iter() {
            stats.leased += group.leased;
            stats.available += group.available.len();
            stats.pending += group.waiters.len();
        }
        stats
    }

    /// Close idle connections past their expiry.
    pub fn close_expired(&self) {
        let now = Instant::now();
        for mut entry in self.groups.iter_mut() {
            self.purge_expired(entry.value_mut(), now);
        }
        self.groups.retain(|_, group| !group.is_unused(self.config.max_per_route));
        self.dispatch_pending();
    }

    /// Close connections idle for longer than `idle`.
    pub fn close_idle(&self, idle: Duration) {
        let now = Instant::now();
        for mut entry in self.groups.iter_mut() {
            let group = entry.value_mut();
            let (stale, kept): (VecDeque<_>, VecDeque<_>) =
                group.available.drain(..).partition(|c| now.duration_since(c.idle_since) >= idle);
            group.available = kept;
            for c in stale {
                self.discard(c);
            }
        }
        self.groups.retain(|_, group| !group.is_unused(self.config.max_per_route));
        self.dispatch_pending();
    }

    /// Start a background task closing expired connections every `interval`.
    /// Stops once the pool is dropped.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let pool = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match pool.upgrade() {
                    Some(pool) => pool.close_expired(),
                    None => break,
                }
            }
        });
    }
}

/// A queued lease request. Dropping it before the lease arrives hands any
/// lease already in flight back to the pool.
struct PendingLease<'a> {
    pool: &'a RoutePool,
    receiver: Option<oneshot::Receiver<Lease>>,
}

impl PendingLease<'_> {
    async fn recv(&mut self) -> Result<Lease, NetError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(NetError::transport(TransportKind::ConnectionClosed, "lease already received"));
        };
        let result = receiver.await;
        self.receiver = None;
        result.map_err(|_| NetError::transport(TransportKind::ConnectionClosed, "connection pool shut down"))
    }
}

impl Drop for PendingLease<'_> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if let Ok(lease) = receiver.try_recv() {
                tracing::debug!(lease = lease.id(), "lease request abandoned");
                self.pool.release(lease, true, None);
            }
        }
    }
}

impl PoolControl for RoutePool {
    fn max_per_route(&self, route: &Route) -> usize {
        self.groups.get(route).map_or(self.config.max_per_route, |g| self.route_max(&g))
    }

    fn set_max_per_route(&self, route: &Route, max: usize) {
        {
            let mut group = self.groups.entry(route.clone()).or_insert_with(RouteGroup::new);
            group.max = Some(max);
            tracing::debug!(route = %route, max, "route capacity changed");
            self.dispatch(&mut group, route);
        }
        self.dispatch_pending();
    }
}

impl ConnectionManager for RoutePool {
    fn lease<'a>(
        &'a self,
        route: &'a Route,
        state: Option<&'a AffinityToken>,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<Lease, NetError>> {
        Box::pin(async move {
            let (waiting, starved) = {
                let mut group = self.groups.entry(route.clone()).or_insert_with(RouteGroup::new);
                if let Some(lease) = self.try_acquire(&mut group, route, state) {
                    return Ok(lease);
                }
                let (sender, receiver) = oneshot::channel();
                group.waiters.push_back(Waiter { state: state.cloned(), sender });
                tracing::debug!(route = %route, pending = group.waiters.len(), "waiting for connection");
                (receiver, self.starved(&group))
            };
            if starved {
                self.dispatch_pending();
            }
            let mut pending = PendingLease { pool: self, receiver: Some(waiting) };
            bounded(timeout, pending.recv(), NetError::pool_timeout).await
        })
    }

    fn connect<'a>(
        &'a self,
        lease: &'a mut Lease,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move {
            let host = lease.route().first_hop().clone();
            tracing::debug!(lease = lease.id(), host = %host, "opening connection");
            bounded(timeout, lease.connection_mut().open(&host, timeout), || {
                NetError::transport(
                    TransportKind::ConnectTimeout,
                    format!("Connect to {} timed out", host.authority()),
                )
            })
            .await
        })
    }

    fn upgrade<'a>(&'a self, lease: &'a mut Lease) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move {
            let target = lease.route().target().clone();
            tracing::debug!(lease = lease.id(), target = %target, "layering TLS");
            lease.connection_mut().upgrade(&target).await
        })
    }

    fn release(&self, lease: Lease, reusable: bool, valid_for: Option<Duration>) {
        let id = lease.id();
        let (route, mut connection, state) = lease.into_parts();
        {
            let mut group = self.groups.entry(route.clone()).or_insert_with(RouteGroup::new);
            group.leased = group.leased.saturating_sub(1);

            if reusable && connection.is_open() {
                let now = Instant::now();
                let expiry = match (valid_for, self.config.idle_timeout) {
                    (Some(a), Some(b)) => Some(now + a.min(b)),
                    (Some(a), None) | (None, Some(a)) => Some(now + a),
                    (None, None) => None,
                };
                tracing::debug!(route = %route, lease = id, state = ?state, "connection kept alive");
                group.available.push_front(IdleConnection { id, connection, state, idle_since: now, expiry });
            } else {
                connection.shutdown();
                self.total.fetch_sub(1, Ordering::Relaxed);
                tracing::debug!(route = %route, lease = id, "connection discarded");
            }
            self.dispatch(&mut group, &route);
        }
        // Freed total capacity may unblock other routes.
        self.dispatch_pending();
    }
}
