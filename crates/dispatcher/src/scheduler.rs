//! DetachedScheduler - timers that outlive the dispatch call that armed them

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Runs work after a delay on the runtime's background scheduler.
///
/// Used for trailing sends of throttled events and for fire-and-forget
/// delayed transport calls. `Dispatch` never awaits these; `settle` does.
#[derive(Debug, Clone, Default)]
pub struct DetachedScheduler {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DetachedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a detached task that runs `task` once `delay` has elapsed
    pub fn spawn_after<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        let mut handles = self.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        debug!(delay_ms = delay.as_millis() as u64, pending = handles.len(), "Detached task armed");
    }

    /// Number of armed tasks that have not finished yet
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every armed task, including tasks armed while waiting
    pub async fn settle(&self) {
        loop {
            let batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    error!(error = ?e, "Detached task panicked");
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay() {
        let scheduler = DetachedScheduler::new();
        let count = Arc::new(AtomicU64::new(0));

        let task_count = Arc::clone(&count);
        scheduler.spawn_after(Duration::from_secs(5), async move {
            task_count.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 1);

        scheduler.settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_chained_tasks() {
        let scheduler = DetachedScheduler::new();
        let count = Arc::new(AtomicU64::new(0));

        let inner_scheduler = scheduler.clone();
        let task_count = Arc::clone(&count);
        scheduler.spawn_after(Duration::from_millis(10), async move {
            let chained_count = Arc::clone(&task_count);
            inner_scheduler.spawn_after(Duration::from_millis(10), async move {
                chained_count.fetch_add(1, Ordering::SeqCst);
            });
            task_count.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_settle_with_nothing_armed() {
        DetachedScheduler::new().settle().await;
    }
}
