//! Client pool: a pool of opaque vector-database connection handles with
//! scoped acquisition, health checking, recycling, and retry semantics.
//!
//! API shape (acquire/release-by-drop, retry-with-backoff) follows an
//! `interact`/`run_with_retry` wrapper pattern; the observable metrics are
//! generalized from inbound-HTTP accounting to outbound pool accounting.
//! The acquire/release/health-check/recycle algorithm itself is original to
//! this module: new state machine logic layered over the shared idioms
//! above.

pub mod metrics;

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{EngineError, EngineResult};
pub use metrics::PoolMetrics;

/// A handle to a vector database connection. The pool owns every instance
/// exclusively; callers only ever see it through a [`Lease`].
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Cheap, low-ms-budget liveness check run before a connection is
    /// handed back to a caller and periodically by the background task.
    async fn health_check(&mut self) -> bool;
}

/// Factory used to create new connections on demand.
pub type ConnectionFactory<C> =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<C>> + Send + Sync>;

struct Idle<C> {
    conn: C,
    created_at: Instant,
}

#[derive(Default)]
struct Counters {
    total_acquires: AtomicU64,
    total_releases: AtomicU64,
    total_timeouts: AtomicU64,
    health_check_failures: AtomicU64,
    connections_created: AtomicU64,
    connections_recycled: AtomicU64,
    connections_failed: AtomicU64,
    active: AtomicUsize,
}

struct Shared<C: Connection> {
    factory: ConnectionFactory<C>,
    config: PoolConfig,
    idle: Mutex<VecDeque<Idle<C>>>,
    created_count: AtomicUsize,
    semaphore: Arc<Semaphore>,
    counters: Counters,
    latency_samples_ms: Mutex<Vec<f64>>,
}

/// A pool of connections to the vector database, sized between
/// `min_size` and `max_size`, with background health checking.
#[derive(Clone)]
pub struct ClientPool<C: Connection> {
    shared: Arc<Shared<C>>,
}

impl<C: Connection> ClientPool<C> {
    /// Build a pool and eagerly warm it to `min_size` connections.
    pub async fn new(config: PoolConfig, factory: ConnectionFactory<C>) -> EngineResult<Self> {
        let shared = Arc::new(Shared {
            semaphore: Arc::new(Semaphore::new(config.max_size)),
            idle: Mutex::new(VecDeque::with_capacity(config.max_size)),
            created_count: AtomicUsize::new(0),
            counters: Counters::default(),
            latency_samples_ms: Mutex::new(Vec::new()),
            factory,
            config,
        });
        let pool = Self { shared };
        for _ in 0..pool.shared.config.min_size {
            match pool.create_connection().await {
                Ok(conn) => {
                    pool.shared
                        .idle
                        .lock()
                        .push_back(Idle { conn, created_at: Instant::now() });
                }
                Err(err) => warn!(error = %err, "failed to warm pool connection"),
            }
        }
        pool.spawn_health_check_task();
        Ok(pool)
    }

    async fn create_connection(&self) -> EngineResult<C> {
        let conn = (self.shared.factory)()
            .await
            .map_err(|e| EngineError::storage("pool_create_connection", e))?;
        self.shared.created_count.fetch_add(1, Ordering::SeqCst);
        self.shared
            .counters
            .connections_created
            .fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    fn spawn_health_check_task(&self) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(shared.config.health_check_interval);
            loop {
                interval.tick().await;
                let mut still_idle = VecDeque::new();
                let candidates: Vec<Idle<C>> = {
                    let mut idle = shared.idle.lock();
                    std::mem::take(&mut *idle).into_iter().collect()
                };
                for mut entry in candidates {
                    if entry.conn.health_check().await {
                        still_idle.push_back(entry);
                    } else {
                        shared
                            .counters
                            .health_check_failures
                            .fetch_add(1, Ordering::Relaxed);
                        shared.created_count.fetch_sub(1, Ordering::SeqCst);
                        shared
                            .counters
                            .connections_failed
                            .fetch_add(1, Ordering::Relaxed);
                        debug!("discarded unhealthy idle connection during background check");
                    }
                }
                *shared.idle.lock() = still_idle;
            }
        });
    }

    /// Acquire a leased connection. Blocks (cooperatively) until one is
    /// available or `acquire_timeout` elapses, in which case this returns
    /// `PoolExhausted`.
    pub async fn acquire(&self) -> EngineResult<Lease<C>> {
        let start = Instant::now();
        let permit = match timeout(
            self.shared.config.acquire_timeout,
            Arc::clone(&self.shared.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            _ => {
                self.shared
                    .counters
                    .total_timeouts
                    .fetch_add(1, Ordering::Relaxed);
                return Err(EngineError::PoolExhausted {
                    active: self.shared.counters.active.load(Ordering::Relaxed),
                    max: self.shared.config.max_size,
                });
            }
        };

        let mut conn = self.take_idle_or_create().await?;
        if !conn.conn.health_check().await {
            self.discard(&mut conn);
            conn = self.take_idle_or_create().await?;
            if !conn.conn.health_check().await {
                self.discard(&mut conn);
                return Err(EngineError::internal(
                    "connection failed health check on both the original and retried attempt",
                ));
            }
        }

        self.shared
            .counters
            .total_acquires
            .fetch_add(1, Ordering::Relaxed);
        self.shared
            .counters
            .active
            .fetch_add(1, Ordering::Relaxed);
        self.shared
            .latency_samples_ms
            .lock()
            .push(start.elapsed().as_secs_f64() * 1000.0);

        Ok(Lease {
            conn: Some(conn),
            pool: Some(self.clone()),
            _permit: Some(permit),
        })
    }

    async fn take_idle_or_create(&self) -> EngineResult<Idle<C>> {
        let popped = self.shared.idle.lock().pop_front();
        match popped {
            Some(idle) => Ok(idle),
            None => Ok(Idle {
                conn: self.create_connection().await?,
                created_at: Instant::now(),
            }),
        }
    }

    fn discard(&self, idle: &mut Idle<C>) {
        let _ = idle;
        self.shared
            .counters
            .health_check_failures
            .fetch_add(1, Ordering::Relaxed);
        self.shared.created_count.fetch_sub(1, Ordering::SeqCst);
        self.shared
            .counters
            .connections_failed
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Called by a dropped [`Lease`]: either recycle (if past `max_age`) or
    /// return the connection to the idle queue.
    fn release(&self, idle: Idle<C>) {
        self.shared
            .counters
            .active
            .fetch_sub(1, Ordering::Relaxed);
        self.shared
            .counters
            .total_releases
            .fetch_add(1, Ordering::Relaxed);

        if metrics::exceeds_max_age(idle.created_at, self.shared.config.max_age) {
            self.shared
                .counters
                .connections_recycled
                .fetch_add(1, Ordering::Relaxed);
            self.shared.created_count.fetch_sub(1, Ordering::SeqCst);
            let pool = self.clone();
            tokio::spawn(async move { pool.replace_up_to_min_size().await });
        } else {
            self.shared.idle.lock().push_back(idle);
        }
    }

    async fn replace_up_to_min_size(&self) {
        let current = self.shared.created_count.load(Ordering::SeqCst);
        if current < self.shared.config.min_size {
            if let Ok(conn) = self.create_connection().await {
                self.shared
                    .idle
                    .lock()
                    .push_back(Idle { conn, created_at: Instant::now() });
            }
        }
    }

    pub fn metrics(&self) -> PoolMetrics {
        let samples = self.shared.latency_samples_ms.lock();
        let avg = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        };
        PoolMetrics {
            pool_size: self.shared.created_count.load(Ordering::SeqCst),
            active: self.shared.counters.active.load(Ordering::Relaxed),
            idle: self.shared.idle.lock().len(),
            total_acquires: self.shared.counters.total_acquires.load(Ordering::Relaxed),
            total_releases: self.shared.counters.total_releases.load(Ordering::Relaxed),
            total_timeouts: self.shared.counters.total_timeouts.load(Ordering::Relaxed),
            avg_acquire_latency_ms: avg,
            health_check_failures: self
                .shared
                .counters
                .health_check_failures
                .load(Ordering::Relaxed),
            connections_created: self
                .shared
                .counters
                .connections_created
                .load(Ordering::Relaxed),
            connections_recycled: self
                .shared
                .counters
                .connections_recycled
                .load(Ordering::Relaxed),
            connections_failed: self
                .shared
                .counters
                .connections_failed
                .load(Ordering::Relaxed),
        }
    }
}

/// A scoped lease on a pooled connection. Returned to the pool automatically
/// on drop, on every exit path including panics unwinding through it.
pub struct Lease<C: Connection> {
    conn: Option<Idle<C>>,
    pool: Option<ClientPool<C>>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl<C: Connection> Deref for Lease<C> {
    type Target = C;
    fn deref(&self) -> &C {
        &self.conn.as_ref().expect("lease used after release").conn
    }
}

impl<C: Connection> DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn.as_mut().expect("lease used after release").conn
    }
}

impl<C: Connection> Drop for Lease<C> {
    fn drop(&mut self) {
        if let (Some(idle), Some(pool)) = (self.conn.take(), self.pool.take()) {
            pool.release(idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct FakeConn {
        healthy: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connection for FakeConn {
        async fn health_check(&mut self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn test_config() -> PoolConfig {
        PoolConfig {
            min_size: 1,
            max_size: 2,
            acquire_timeout: Duration::from_millis(200),
            max_age: Duration::from_secs(3600),
            health_check_interval: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn acquire_and_release_roundtrip() {
        let healthy = Arc::new(AtomicBool::new(true));
        let factory: ConnectionFactory<FakeConn> = {
            let healthy = Arc::clone(&healthy);
            Arc::new(move || {
                let healthy = Arc::clone(&healthy);
                Box::pin(async move { Ok(FakeConn { healthy }) })
            })
        };
        let pool = ClientPool::new(test_config(), factory).await.unwrap();
        {
            let _lease = pool.acquire().await.unwrap();
            assert_eq!(pool.metrics().active, 1);
        }
        assert_eq!(pool.metrics().active, 0);
        assert!(pool.metrics().idle >= 1);
    }

    #[tokio::test]
    async fn exhausted_pool_times_out() {
        let healthy = Arc::new(AtomicBool::new(true));
        let factory: ConnectionFactory<FakeConn> = {
            let healthy = Arc::clone(&healthy);
            Arc::new(move || {
                let healthy = Arc::clone(&healthy);
                Box::pin(async move { Ok(FakeConn { healthy }) })
            })
        };
        let pool = ClientPool::new(test_config(), factory).await.unwrap();
        let _l1 = pool.acquire().await.unwrap();
        let _l2 = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, EngineError::PoolExhausted { .. }));
    }

    #[tokio::test]
    async fn unhealthy_connection_is_discarded_and_retried() {
        let healthy = Arc::new(AtomicBool::new(false));
        let factory: ConnectionFactory<FakeConn> = {
            let healthy = Arc::clone(&healthy);
            Arc::new(move || {
                let healthy = Arc::clone(&healthy);
                Box::pin(async move { Ok(FakeConn { healthy }) })
            })
        };
        let pool = ClientPool::new(PoolConfig { min_size: 0, ..test_config() }, factory)
            .await
            .unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }
}
