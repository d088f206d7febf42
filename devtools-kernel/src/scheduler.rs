//! Bounded worker pool for tool invocations.
//!
//! Every call runs on its own task so a session can keep watching for
//! cancellation while a handler is busy. Each session owns its pool, so a
//! slow handler in one session never holds a slot another session waits on.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

/// Call slots of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    slots: NonZeroUsize,
}

impl SchedulerConfig {
    /// Builds a configuration from a plain count, treating `0` as `1`.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Returns how many calls may run at once.
    #[must_use]
    pub const fn slots(self) -> NonZeroUsize {
        self.slots
    }
}

/// Runs invocations on `tokio` tasks, at most [`SchedulerConfig::slots`] at a time.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    slots: Arc<Semaphore>,
    limit: NonZeroUsize,
}

impl TaskScheduler {
    /// Creates a pool with the configured number of slots.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.slots().get())),
            limit: config.slots(),
        }
    }

    /// Returns how many calls currently hold a slot.
    #[must_use]
    pub fn busy(&self) -> usize {
        self.limit.get() - self.slots.available_permits()
    }

    /// Returns `true` once [`TaskScheduler::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Stops handing out slots. Calls still waiting for one resolve to
    /// [`SchedulerError::Closed`] without running; running calls are untouched.
    pub fn close(&self) {
        self.slots.close();
    }

    /// Queues `call` until a slot frees up, then runs it.
    ///
    /// Aborting the returned handle drops the call whether it is still
    /// waiting or already running.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] when the pool no longer accepts work.
    pub fn spawn<F, T>(&self, call: F) -> SchedulerResult<JoinHandle<SchedulerResult<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        if self.slots.available_permits() == 0 {
            trace!(limit = self.limit.get(), "all call slots busy; queueing");
        }

        let slots = Arc::clone(&self.slots);
        Ok(tokio::spawn(async move {
            let _slot = slots
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::Closed)?;
            Ok(call.await)
        }))
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The pool is closed because the server is stopping.
    #[error("server is shutting down")]
    Closed,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_the_slot_count() {
        let scheduler = TaskScheduler::new(SchedulerConfig::with_limit(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                scheduler
                    .spawn(async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap()
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.busy(), 0);
    }

    #[tokio::test]
    async fn closed_pool_rejects_new_calls() {
        let scheduler = TaskScheduler::new(SchedulerConfig::with_limit(4));
        scheduler.close();

        assert!(scheduler.is_closed());
        assert_eq!(scheduler.spawn(async {}).unwrap_err(), SchedulerError::Closed);
    }

    #[tokio::test]
    async fn closing_releases_waiting_calls() {
        let scheduler = TaskScheduler::new(SchedulerConfig::with_limit(1));
        let blocker = scheduler
            .spawn(tokio::time::sleep(Duration::from_secs(60)))
            .unwrap();
        let waiting = scheduler.spawn(async { 7 }).unwrap();
        tokio::task::yield_now().await;

        scheduler.close();
        assert_eq!(waiting.await.unwrap(), Err(SchedulerError::Closed));
        blocker.abort();
    }

    #[test]
    fn zero_limit_is_clamped() {
        assert_eq!(SchedulerConfig::with_limit(0).slots().get(), 1);
    }
}
