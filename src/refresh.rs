//! Periodic refresh tied to the lifetime of a handle
//!
//! The job runs once right away and then on every tick. Dropping the handle stops it, so a
//! view that owns a `RefreshTask` never leaves a timer running after it goes away.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct RefreshTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTask {
    /// Start running `job` every `period` on the current runtime
    pub fn spawn<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let shutdown = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = job() => {}
                }
            }
            tracing::debug!("refresh task stopped");
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the loop to exit
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "refresh task ended abnormally");
            }
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(period: Duration) -> (RefreshTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let task = RefreshTask::spawn(period, move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_on_interval() {
        let (task, count) = counting_task(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(24)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (task, count) = counting_task(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        task.cancel();
        assert!(task.is_cancelled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticks() {
        let (task, count) = counting_task(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(task);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
