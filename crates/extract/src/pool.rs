use std::sync::Arc;

use tokio::sync::Semaphore;

use prodsplit_core::ExtractError;

/// Bounded worker pool for CPU-bound extraction work.
///
/// Explicitly constructed and passed in as a dependency so resource
/// limits are visible at the call site. Sized independently of any
/// network concurrency: extraction never waits on classifier latency.
#[derive(Clone)]
pub struct PagePool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl PagePool {
    pub fn new(size: usize) -> Self {
        // A zero-sized pool would deadlock every caller.
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `work` on a blocking worker, waiting for a pool slot first.
    pub async fn run<T, F>(&self, work: F) -> Result<T, ExtractError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ExtractError::Pool(format!("pool closed: {e}")))?;

        let handle = tokio::task::spawn_blocking(move || {
            let result = work();
            drop(permit);
            result
        });

        handle
            .await
            .map_err(|e| ExtractError::Pool(format!("extraction task panicked: {e}")))
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool").field("size", &self.size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_work_and_returns_value() {
        let pool = PagePool::new(2);
        let value = pool.run(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn zero_size_is_clamped_to_one() {
        let pool = PagePool::new(0);
        assert_eq!(pool.size(), 1);
        // Still executes work instead of deadlocking.
        let value = pool.run(|| "ok").await.unwrap();
        assert_eq!(value, "ok");
    }

    #[tokio::test]
    async fn bounded_concurrency_serializes_excess_work() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let pool = PagePool::new(1);
        let peak = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = pool.clone();
            let peak = peak.clone();
            let active = active.clone();
            handles.push(tokio::spawn(async move {
                pool.run(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
