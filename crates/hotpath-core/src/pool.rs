//! Bounded worker pool for variant profiling
//!
//! Sibling variants are embarrassingly parallel: each compiles and
//! profiles inside its own directory. The pool bounds concurrency and
//! collects results into a pre-sized table with exactly one slot per
//! submitted task, written at most once. Joining the pool is the barrier
//! before the evaluating stage.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Bounded pool of independent profiling tasks
#[derive(Debug, Clone)]
pub struct ProfilingPool {
    max_workers: usize,
}

impl ProfilingPool {
    /// Create a pool with at most `max_workers` concurrent tasks
    #[inline]
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Configured worker bound
    #[inline]
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run all tasks under the worker bound and join
    ///
    /// Returns one slot per task, in submission order. A task that
    /// panics leaves its slot `None`; every other slot is written exactly
    /// once.
    pub async fn run_all<T, F, Fut>(&self, tasks: Vec<F>) -> Vec<Option<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("pool semaphore is never closed");
                (index, task().await)
            });
        }

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, value)) => {
                    debug_assert!(slots[index].is_none(), "slot written twice");
                    slots[index] = Some(value);
                }
                Err(err) => {
                    tracing::warn!(%err, "profiling task did not complete");
                }
            }
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn results_keep_submission_order() {
        let pool = ProfilingPool::new(2);
        let tasks: Vec<_> = (0..5_u64)
            .map(|i| {
                move || async move {
                    // Later tasks finish first; order must still hold.
                    tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
                    i
                }
            })
            .collect();

        let slots = pool.run_all(tasks).await;
        let values: Vec<u64> = slots.into_iter().map(Option::unwrap).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn worker_bound_is_respected() {
        let pool = ProfilingPool::new(2);
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let live = Arc::clone(&live);
                let peak = Arc::clone(&peak);
                move || async move {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    live.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();

        pool.run_all(tasks).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_submission_joins_immediately() {
        let pool = ProfilingPool::new(4);
        let tasks: Vec<fn() -> std::future::Ready<u32>> = Vec::new();
        let slots = pool.run_all(tasks).await;
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn zero_workers_clamps_to_one() {
        let pool = ProfilingPool::new(0);
        assert_eq!(pool.max_workers(), 1);
    }
}
