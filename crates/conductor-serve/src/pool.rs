// ABOUTME: Fixed-capacity worker pool with generation-tagged hard recycling
// ABOUTME: Recycle discards in-flight work outright and rebuilds a fresh pool

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

type Job = BoxFuture<'static, ()>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool has been shut down")]
    Unavailable,

    #[error("work was discarded by a pool recycle")]
    Discarded,
}

/// Handle to a submitted unit of work.
///
/// The handle is tagged with the pool generation it was submitted against;
/// if that generation is recycled away, joining resolves to `Discarded`.
pub struct JobHandle<T> {
    generation: u64,
    rx: oneshot::Receiver<T>,
}

impl<T> JobHandle<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn join(self) -> Result<T, PoolError> {
        self.rx.await.map_err(|_| PoolError::Discarded)
    }
}

struct PoolInner {
    tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl PoolInner {
    fn spawn(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..capacity)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        match job {
                            Some(job) => job.await,
                            None => break,
                        }
                    }
                    tracing::trace!(worker, "Worker drained");
                })
            })
            .collect();

        Self { tx, workers }
    }

    fn discard(self) {
        drop(self.tx);
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// A bounded pool of workers, exclusively owned by one session.
///
/// Cancellation is forcible at this layer: `recycle` aborts everything in the
/// current generation rather than draining it, so stuck or leaky work can
/// never bleed into the next run.
pub struct WorkerPool {
    capacity: usize,
    generation: u64,
    inner: Option<PoolInner>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            generation: 0,
            inner: Some(PoolInner::spawn(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Generation counter, incremented on every recycle.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    /// Dispatch work to the current generation.
    pub async fn submit<F, T>(&self, work: F) -> Result<JobHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.as_ref().ok_or(PoolError::Unavailable)?;

        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = work.await;
            // Receiver may have been dropped; the work itself still ran.
            let _ = done_tx.send(result);
        });

        inner.tx.send(job).await.map_err(|_| PoolError::Unavailable)?;
        Ok(JobHandle {
            generation: self.generation,
            rx: done_rx,
        })
    }

    /// Discard all outstanding work and rebuild a fresh pool.
    pub fn recycle(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.discard();
        }
        self.generation += 1;
        self.inner = Some(PoolInner::spawn(self.capacity));
        tracing::debug!(generation = self.generation, "Worker pool recycled");
    }

    /// Discard all outstanding work without creating a replacement. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.discard();
            tracing::debug!(generation = self.generation, "Worker pool shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_runs_work_and_returns_result() {
        let pool = WorkerPool::new(2);
        let handle = pool.submit(async { 21 * 2 }).await.unwrap();
        assert_eq!(handle.generation(), 0);
        assert_eq!(handle.join().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_recycle_discards_outstanding_work() {
        let mut pool = WorkerPool::new(1);
        let handle = pool
            .submit(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .await
            .unwrap();

        pool.recycle();
        assert!(matches!(handle.join().await, Err(PoolError::Discarded)));
    }

    #[tokio::test]
    async fn test_recycle_discards_queued_work_behind_a_stuck_job() {
        let mut pool = WorkerPool::new(1);
        // Occupy the only worker.
        let stuck = pool
            .submit(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .await
            .unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        let queued = pool
            .submit(async move {
                ran_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        pool.recycle();
        assert!(matches!(stuck.join().await, Err(PoolError::Discarded)));
        assert!(matches!(queued.join().await, Err(PoolError::Discarded)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pool_usable_after_recycle() {
        let mut pool = WorkerPool::new(2);
        pool.recycle();
        let handle = pool.submit(async { "fresh" }).await.unwrap();
        assert_eq!(handle.generation(), 1);
        assert_eq!(handle.join().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_double_recycle_increments_generation_exactly_twice() {
        let mut pool = WorkerPool::new(2);
        assert_eq!(pool.generation(), 0);
        pool.recycle();
        pool.recycle();
        assert_eq!(pool.generation(), 2);
        assert!(pool.is_available());
        assert!(pool.submit(async {}).await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_unavailable() {
        let mut pool = WorkerPool::new(2);
        pool.shutdown();
        assert!(!pool.is_available());
        assert!(matches!(
            pool.submit(async {}).await,
            Err(PoolError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let mut pool = WorkerPool::new(2);
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.generation(), 0);
        assert!(!pool.is_available());
    }

    #[tokio::test]
    async fn test_workers_run_in_parallel_up_to_capacity() {
        let pool = WorkerPool::new(4);
        let gauge = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let gauge = Arc::clone(&gauge);
            handles.push(
                pool.submit(async move {
                    gauge.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    gauge.load(Ordering::SeqCst)
                })
                .await
                .unwrap(),
            );
        }

        let mut max_seen = 0;
        for handle in handles {
            max_seen = max_seen.max(handle.join().await.unwrap());
        }
        assert_eq!(max_seen, 4);
    }
}
