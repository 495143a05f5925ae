use crate::error::{FleetError, Result};
use rayon::prelude::*;
use rayon::ThreadPool;

/// Bounded fan-out executor for the per-phase work items.
///
/// Workers receive immutable input and return an owned fragment; completion
/// order inside the pool is unspecified, so consumers must merge results
/// commutatively. Phase workers are expected to catch their own failures and
/// yield a default fragment instead of panicking.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `size` workers; `None` uses the host CPU count.
    pub fn new(size: Option<usize>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size.unwrap_or(0))
            .build()
            .map_err(|e| FleetError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn map<T, R, F>(&self, items: &[T], worker: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Send + Sync,
    {
        self.pool
            .install(|| items.par_iter().map(|item| worker(item)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn map_visits_every_item_once() {
        let pool = WorkerPool::new(Some(4)).unwrap();
        let calls = AtomicUsize::new(0);
        let items: Vec<u64> = (0..100).collect();
        let results = pool.map(&items, |n| {
            calls.fetch_add(1, Ordering::Relaxed);
            n * 2
        });
        assert_eq!(calls.load(Ordering::Relaxed), 100);
        assert_eq!(results.iter().sum::<u64>(), items.iter().sum::<u64>() * 2);
    }

    #[test]
    fn one_failed_item_does_not_poison_the_batch() {
        let pool = WorkerPool::new(Some(2)).unwrap();
        let items = vec![1u32, 0, 3];
        let results = pool.map(&items, |n| if *n == 0 { None } else { Some(n * 10) });
        assert_eq!(results.iter().flatten().count(), 2);
    }

    #[test]
    fn default_size_uses_host_cpus() {
        let pool = WorkerPool::new(None).unwrap();
        assert!(pool.workers() >= 1);
    }
}
