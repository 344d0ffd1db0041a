use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out waiting for lock `{0}`")]
    WaitTimeout(String),

    #[error("lock backend unavailable: {0}")]
    Backend(String),
}

/// Backend hook the guard calls on drop. Release must be cheap and
/// non-blocking; a remote backend should hand the call off to a task.
pub trait LockReleaser: Send + Sync {
    fn release(&self, key: &str, token: Uuid);
}

/// A held lease. Dropping the guard releases the lease, which gives
/// release-on-all-exit-paths for the nested wallet/signal locks.
pub struct LockGuard {
    key: String,
    token: Uuid,
    releaser: Arc<dyn LockReleaser>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.releaser.release(&self.key, self.token);
    }
}

/// Exclusive, named, TTL-bound leases.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Immediate-fail acquisition. `None` means another holder owns the
    /// lease; for signal/message locks that is success-with-skip, not an
    /// error.
    async fn try_acquire(&self, key: &str, ttl: Duration)
    -> Result<Option<LockGuard>, LockError>;

    /// Wait-bounded acquisition: queue behind other holders for up to
    /// `wait`. The lease TTL is independent of the wait budget.
    async fn acquire_with_wait(
        &self,
        key: &str,
        ttl: Duration,
        wait: Duration,
    ) -> Result<LockGuard, LockError>;

    async fn ping(&self) -> Result<(), LockError>;
}

struct Lease {
    token: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
struct LeaseMap {
    leases: Mutex<HashMap<String, Lease>>,
}

impl LockReleaser for LeaseMap {
    fn release(&self, key: &str, token: Uuid) {
        let mut leases = self.leases.lock().expect("lease map poisoned");
        // Only the holder's own token may release; an expired lease may
        // already have been reclaimed by another worker.
        if let Some(lease) = leases.get(key) {
            if lease.token == token {
                leases.remove(key);
            }
        }
    }
}

/// In-process lease service: a keyed map guarded by a mutex with TTL expiry
/// on access. This is the local realization of the external lock
/// collaborator; the `LockService` contract is what the executor depends on.
#[derive(Clone, Default)]
pub struct InMemoryLockService {
    inner: Arc<LeaseMap>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_take(&self, key: &str, ttl: Duration) -> Option<LockGuard> {
        let mut leases = self.inner.leases.lock().expect("lease map poisoned");
        let now = Instant::now();

        if let Some(lease) = leases.get(key) {
            if lease.expires_at > now {
                return None;
            }
            warn!("Lease on `{}` expired before release, reclaiming", key);
            leases.remove(key);
        }

        let token = Uuid::new_v4();
        leases.insert(
            key.to_string(),
            Lease {
                token,
                expires_at: now + ttl,
            },
        );
        Some(LockGuard {
            key: key.to_string(),
            token,
            releaser: self.inner.clone(),
        })
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockGuard>, LockError> {
        Ok(self.try_take(key, ttl))
    }

    async fn acquire_with_wait(
        &self,
        key: &str,
        ttl: Duration,
        wait: Duration,
    ) -> Result<LockGuard, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(guard) = self.try_take(key, ttl) {
                return Ok(guard);
            }
            if Instant::now() >= deadline {
                return Err(LockError::WaitTimeout(key.to_string()));
            }
            sleep(ACQUIRE_POLL_INTERVAL).await;
        }
    }

    async fn ping(&self) -> Result<(), LockError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let locks = InMemoryLockService::new();
        let guard = locks.try_acquire("wallet-trade:0xA", TTL).await.unwrap();
        assert!(guard.is_some());
        assert!(
            locks
                .try_acquire("wallet-trade:0xA", TTL)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn dropping_the_guard_releases_the_lease() {
        let locks = InMemoryLockService::new();
        let guard = locks.try_acquire("k", TTL).await.unwrap().unwrap();
        drop(guard);
        assert!(locks.try_acquire("k", TTL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let locks = InMemoryLockService::new();
        let guard = locks
            .try_acquire("k", Duration::from_millis(20))
            .await
            .unwrap()
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        // TTL elapsed: a new holder may take over even though the old guard
        // is still alive.
        let second = locks.try_acquire("k", TTL).await.unwrap();
        assert!(second.is_some());
        // The stale guard's drop must not evict the new holder's lease.
        drop(guard);
        assert!(locks.try_acquire("k", TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn waiting_acquire_succeeds_once_released() {
        let locks = InMemoryLockService::new();
        let guard = locks.try_acquire("k", TTL).await.unwrap().unwrap();

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            locks2
                .acquire_with_wait("k", TTL, Duration::from_secs(2))
                .await
        });

        sleep(Duration::from_millis(100)).await;
        drop(guard);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn waiting_acquire_times_out() {
        let locks = InMemoryLockService::new();
        let _guard = locks.try_acquire("k", TTL).await.unwrap().unwrap();

        let result = locks
            .acquire_with_wait("k", TTL, Duration::from_millis(120))
            .await;
        assert!(matches!(result, Err(LockError::WaitTimeout(_))));
    }
}
