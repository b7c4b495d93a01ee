//! Bounded concurrency pools.
//!
//! A pool hands out [`PoolToken`]s backed by owned semaphore permits. Capacity
//! is returned when the token is dropped, so every exit path of a task
//! releases exactly once. The pool also keeps an in-use counter and its
//! high-water mark for diagnostics.

use crate::error::ScanError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A bounded pool of concurrency tokens.
#[derive(Debug, Clone)]
pub struct ConcurrencyPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_use: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyPool {
    /// Create a pool with the given capacity. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_use: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a token.
    pub async fn acquire(&self) -> Result<PoolToken, ScanError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ScanError::PoolClosed)?;

        let now = self.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(PoolToken {
            _permit: permit,
            in_use: Arc::clone(&self.in_use),
        })
    }

    /// Maximum number of outstanding tokens.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Highest number of tokens ever held at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A held unit of pool capacity, released on drop.
#[derive(Debug)]
pub struct PoolToken {
    _permit: OwnedSemaphorePermit,
    in_use: Arc<AtomicUsize>,
}

impl Drop for PoolToken {
    fn drop(&mut self) {
        // Runs before the permit field is dropped: in_use never exceeds capacity.
        self.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tokens_release_on_drop() {
        let pool = ConcurrencyPool::new(2);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(pool.in_use(), 2);

        drop(a);
        assert_eq!(pool.in_use(), 1);
        drop(b);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.peak(), 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_raised() {
        let pool = ConcurrencyPool::new(0);
        assert_eq!(pool.capacity(), 1);
        let _token = pool.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn test_peak_never_exceeds_capacity() {
        let pool = ConcurrencyPool::new(3);
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..20 {
            let pool = pool.clone();
            tasks.spawn(async move {
                let _token = pool.acquire().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }

        assert_eq!(pool.peak(), 3);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let pool = ConcurrencyPool::new(1);
        let held = pool.acquire().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
        assert!(waiting.is_err());

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(200), pool.acquire()).await;
        assert!(again.is_ok());
    }
}
