mod common;

use common::MockFactory;
use hopnet::base::neterror::TransportKind;
use hopnet::route::{HttpHost, Route};
use hopnet::socket::{
    AffinityToken, ConnectionHolder, ConnectionManager, PoolConfig, PoolControl, RoutePool,
};
use std::sync::Arc;
use std::time::Duration;

fn route() -> Route {
    Route::direct(HttpHost::http("example.com", 80))
}

fn limited(factory: &MockFactory, max_per_route: usize) -> Arc<RoutePool> {
    Arc::new(RoutePool::with_config(factory.clone(), PoolConfig { max_per_route, ..PoolConfig::default() }))
}

#[tokio::test]
async fn test_pool_limits_and_fifo_waiters() {
    let factory = MockFactory::new();
    let pool = limited(&factory, 2);

    // 1. Consume both slots
    let a = pool.lease(&route(), None, None).await.unwrap();
    let b = pool.lease(&route(), None, None).await.unwrap();
    assert_eq!(pool.stats(&route()).leased, 2);

    // 2. Queue two waiters in order
    let first = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.lease(&route(), None, None).await })
    };
    tokio::task::yield_now().await;
    let second = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.lease(&route(), None, None).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(pool.stats(&route()).pending, 2);

    // 3. Each release feeds the oldest waiter
    pool.release(a, false, None);
    let first = first.await.unwrap().unwrap();
    assert_eq!(pool.stats(&route()).pending, 1);

    pool.release(b, false, None);
    let second = second.await.unwrap().unwrap();
    assert!(first.id() < second.id(), "waiters are served in arrival order");
    assert_eq!(pool.stats(&route()).leased, 2);
}

#[tokio::test(start_paused = true)]
async fn test_lease_timeout() {
    let factory = MockFactory::new();
    let pool = limited(&factory, 1);
    let _held = pool.lease(&route(), None, None).await.unwrap();

    let err = pool.lease(&route(), None, Some(Duration::from_secs(5))).await.unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportKind::PoolTimeout));
}

#[tokio::test]
async fn test_released_connection_is_reused() {
    let factory = MockFactory::new();
    let pool = factory.pool();

    let mut lease = pool.lease(&route(), None, None).await.unwrap();
    assert!(!lease.is_reused());
    pool.connect(&mut lease, None).await.unwrap();
    let id = lease.id();
    pool.release(lease, true, None);

    let again = pool.lease(&route(), None, None).await.unwrap();
    assert!(again.is_reused());
    assert_eq!(again.id(), id);
    assert!(again.connection().is_open());
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn test_closed_connection_not_pooled() {
    let factory = MockFactory::new();
    let pool = factory.pool();

    let lease = pool.lease(&route(), None, None).await.unwrap();
    pool.release(lease, true, None);

    assert_eq!(pool.stats(&route()).available, 0);
    assert_eq!(pool.total_stats().leased, 0);
}

#[tokio::test]
async fn test_affinity_token_matching() {
    let factory = MockFactory::new();
    let pool = factory.pool();
    let alice = AffinityToken::new("alice");
    let bob = AffinityToken::new("bob");

    let mut lease = pool.lease(&route(), None, None).await.unwrap();
    pool.connect(&mut lease, None).await.unwrap();
    lease.set_state(Some(alice.clone()));
    pool.release(lease, true, None);

    // Bound to another principal: not handed out.
    let for_bob = pool.lease(&route(), Some(&bob), None).await.unwrap();
    assert!(!for_bob.is_reused());
    assert_eq!(factory.created(), 2);

    let for_alice = pool.lease(&route(), Some(&alice), None).await.unwrap();
    assert!(for_alice.is_reused());
    assert_eq!(for_alice.state(), Some(&alice));
}

#[tokio::test]
async fn test_stateful_request_takes_stateless_connection() {
    let factory = MockFactory::new();
    let pool = factory.pool();

    let mut lease = pool.lease(&route(), None, None).await.unwrap();
    pool.connect(&mut lease, None).await.unwrap();
    pool.release(lease, true, None);

    let alice = AffinityToken::new("alice");
    let lease = pool.lease(&route(), Some(&alice), None).await.unwrap();
    assert!(lease.is_reused());
    assert_eq!(factory.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_expiry() {
    let factory = MockFactory::new();
    let pool = factory.pool();

    let mut lease = pool.lease(&route(), None, None).await.unwrap();
    pool.connect(&mut lease, None).await.unwrap();
    pool.release(lease, true, Some(Duration::from_secs(10)));

    tokio::time::advance(Duration::from_secs(11)).await;
    let lease = pool.lease(&route(), None, None).await.unwrap();
    assert!(!lease.is_reused());
    assert_eq!(factory.journal.count("shutdown"), 1);
}

#[tokio::test]
async fn test_close_idle() {
    let factory = MockFactory::new();
    let pool = factory.pool();

    let mut lease = pool.lease(&route(), None, None).await.unwrap();
    pool.connect(&mut lease, None).await.unwrap();
    pool.release(lease, true, None);
    assert_eq!(pool.stats(&route()).available, 1);

    pool.close_idle(Duration::ZERO);
    assert_eq!(pool.stats(&route()).available, 0);
    assert_eq!(pool.total_stats().available, 0);
    assert_eq!(factory.journal.count("shutdown"), 1);
}

#[tokio::test]
async fn test_raising_limit_serves_waiters() {
    let factory = MockFactory::new();
    let pool = limited(&factory, 1);
    let _held = pool.lease(&route(), None, None).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.lease(&route(), None, None).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(pool.stats(&route()).pending, 1);

    pool.set_max_per_route(&route(), 2);
    assert!(waiter.await.unwrap().is_ok());
    assert_eq!(pool.max_per_route(&route()), 2);
}

#[tokio::test]
async fn test_holder_release_and_abort() {
    let factory = MockFactory::new();
    let pool = factory.pool();

    // Released as reusable: pooled.
    let mut lease = pool.lease(&route(), None, None).await.unwrap();
    pool.connect(&mut lease, None).await.unwrap();
    let mut holder = ConnectionHolder::new(pool.clone(), lease);
    holder.mark_reusable();
    holder.release_connection();
    assert!(holder.is_released());
    holder.abort_connection();
    assert_eq!(pool.stats(&route()).available, 1, "second release is a no-op");

    // Dropped without release: aborted.
    let lease = pool.lease(&route(), None, None).await.unwrap();
    let holder = ConnectionHolder::new(pool.clone(), lease);
    drop(holder);
    let stats = pool.stats(&route());
    assert_eq!(stats.leased, 0);
    assert_eq!(stats.available, 0);
    assert_eq!(factory.journal.count("shutdown"), 1);
}

fn single_slot(factory: &MockFactory) -> Arc<RoutePool> {
    Arc::new(RoutePool::with_config(factory.clone(), PoolConfig { max_total: 1, ..PoolConfig::default() }))
}

fn host_route(host: &str) -> Route {
    Route::direct(HttpHost::http(host, 80))
}

#[tokio::test(start_paused = true)]
async fn test_total_limit_closes_idle_on_other_route() {
    let factory = MockFactory::new();
    let pool = single_slot(&factory);
    let (a, b) = (host_route("a.example"), host_route("b.example"));

    let mut lease = pool.lease(&a, None, None).await.unwrap();
    pool.connect(&mut lease, None).await.unwrap();
    pool.release(lease, true, None);
    assert_eq!(pool.stats(&a).available, 1);

    // The only slot is idle on another route: it is closed to make room.
    let lease = pool.lease(&b, None, Some(Duration::from_secs(1))).await.unwrap();
    assert!(!lease.is_reused());
    assert_eq!(lease.route(), &b);
    assert_eq!(pool.stats(&a).available, 0);
    assert_eq!(factory.journal.count("shutdown"), 1);
    assert_eq!(pool.total_stats().leased, 1);
}

#[tokio::test(start_paused = true)]
async fn test_total_limit_keeps_oldest_idle_last() {
    let factory = MockFactory::new();
    let pool = Arc::new(RoutePool::with_config(
        factory.clone(),
        PoolConfig { max_total: 2, ..PoolConfig::default() },
    ));
    let (a, b, c) = (host_route("a.example"), host_route("b.example"), host_route("c.example"));

    for route in [&a, &b] {
        let mut lease = pool.lease(route, None, None).await.unwrap();
        pool.connect(&mut lease, None).await.unwrap();
        pool.release(lease, true, None);
        tokio::time::advance(Duration::from_secs(1)).await;
    }

    let _c = pool.lease(&c, None, Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(pool.stats(&a).available, 0, "least recently used is closed");
    assert_eq!(pool.stats(&b).available, 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_wakes_waiter_on_other_route() {
    let factory = MockFactory::new();
    let pool = single_slot(&factory);
    let (a, b) = (host_route("a.example"), host_route("b.example"));
    let held = pool.lease(&a, None, None).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        let b = b.clone();
        tokio::spawn(async move { pool.lease(&b, None, None).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(pool.stats(&b).pending, 1);

    pool.release(held, false, None);
    let lease = tokio::time::timeout(Duration::from_secs(60), waiter).await.unwrap().unwrap().unwrap();
    assert_eq!(lease.route(), &b);
    assert_eq!(pool.stats(&b).pending, 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_release_hands_slot_to_other_route() {
    let factory = MockFactory::new();
    let pool = single_slot(&factory);
    let (a, b) = (host_route("a.example"), host_route("b.example"));
    let mut held = pool.lease(&a, None, None).await.unwrap();
    pool.connect(&mut held, None).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        let b = b.clone();
        tokio::spawn(async move { pool.lease(&b, None, None).await })
    };
    tokio::task::yield_now().await;

    // Kept alive on `a`, but `b` is waiting for the only slot.
    pool.release(held, true, None);
    let lease = tokio::time::timeout(Duration::from_secs(60), waiter).await.unwrap().unwrap().unwrap();
    assert_eq!(lease.route(), &b);
    assert_eq!(pool.stats(&a).available, 0);
    assert_eq!(factory.journal.count("shutdown"), 1);
}
