use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    ShutDown,

    #[error("worker job failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PoolStatus {
    pub max: usize,
    pub busy: usize,
    pub shut_down: bool,
}

/// Bounded pool for blocking work (external processes, sync file IO).
///
/// Jobs run on tokio's blocking threads, but never more than `max_workers`
/// at once; extra submissions wait for a permit. Each permit travels with
/// its job, so a slot stays taken until the job itself returns, even when
/// the submitting request has been dropped.
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    max_workers: usize,
}

impl BlockingPool {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        tracing::info!("👷 Worker pool started with {} slots", max_workers);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            tracker: TaskTracker::new(),
            max_workers,
        }
    }

    /// Run `job` on a worker slot and wait for its result.
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.tracker.is_closed() {
            return Err(PoolError::ShutDown);
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::ShutDown)?;

        let handle = self.tracker.spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        Ok(handle.await?)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max: self.max_workers,
            busy: self
                .max_workers
                .saturating_sub(self.permits.available_permits()),
            shut_down: self.tracker.is_closed(),
        }
    }

    /// Reject new and queued jobs, then wait up to `timeout` for running ones.
    /// Returns false if jobs were still running when the timeout expired.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        if !self.tracker.is_closed() {
            tracing::info!("🛑 Draining worker pool ({} busy)", self.status().busy);
        }
        self.tracker.close();
        self.permits.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("✅ Worker pool drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    "⚠️  Worker pool drain timed out after {:?} with {} job(s) still running",
                    timeout,
                    self.tracker.len()
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_runs_job_and_returns_value() {
        let pool = BlockingPool::new(2);
        let value = pool.run(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.status().busy, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let pool = Arc::new(BlockingPool::new(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..8).map(|_| {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }
        });

        for result in futures::future::join_all(jobs).await {
            result.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_rejects_jobs_after_shutdown() {
        let pool = BlockingPool::new(1);
        assert!(pool.shutdown(Duration::from_secs(1)).await);
        assert!(pool.status().shut_down);

        let result = pool.run(|| ()).await;
        assert!(matches!(result, Err(PoolError::ShutDown)));

        // second shutdown is a no-op
        assert!(pool.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_waits_for_abandoned_jobs() {
        let pool = Arc::new(BlockingPool::new(1));
        let finished = Arc::new(AtomicUsize::new(0));

        let submitted = {
            let pool = pool.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                pool.run(move || {
                    std::thread::sleep(Duration::from_millis(200));
                    finished.fetch_add(1, Ordering::SeqCst);
                })
                .await
            })
        };

        // let the job start, then abandon the caller
        tokio::time::sleep(Duration::from_millis(50)).await;
        submitted.abort();

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_times_out_on_stuck_job() {
        let pool = Arc::new(BlockingPool::new(1));
        let background = pool.clone();
        tokio::spawn(async move {
            let _ = background
                .run(|| std::thread::sleep(Duration::from_millis(500)))
                .await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!pool.shutdown(Duration::from_millis(10)).await);
    }
}
