//! Cancellable fixed-period background jobs
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A tokio task that runs `tick` after an initial delay and then once per period.
///
/// Ticks never overlap: a slow tick pushes the next one back instead of queueing a
/// burst. Cancellation only takes effect at an await point inside the tick.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Spawn on the current tokio runtime. A zero period is raised to one millisecond.
    pub fn spawn<F, Fut>(name: &'static str, initial_delay: Duration, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });

        PeriodicTask {
            name,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Cancel the task. Calling it again is a no-op.
    pub fn stop(&self) {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Stopped {}", self.name);
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn ticks_until_stopped_and_stop_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let task = {
            let count = count.clone();
            PeriodicTask::spawn("counter", Duration::ZERO, Duration::from_millis(10), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(task.is_running());
        task.stop();
        task.stop();
        assert!(!task.is_running());

        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 3, "only {} ticks", seen);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn initial_delay_postpones_first_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let task = {
            let count = count.clone();
            PeriodicTask::spawn("delayed", Duration::from_secs(60), Duration::from_millis(10), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(task);
    }
}
