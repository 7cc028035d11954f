//! Periodic task with an explicit cancel handle.

#![forbid(unsafe_code)]

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Cancellation handle that aborts the underlying task. Dropping it cancels too.
#[derive(Debug)]
pub struct CancelHandle {
    task: Option<JoinHandle<()>>,
}

impl CancelHandle {
    pub fn cancel(mut self) {
        if let Some(h) = self.task.take() {
            h.abort();
        }
    }

    pub fn is_finished(&self) -> bool { self.task.as_ref().map_or(true, |h| h.is_finished()) }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        if let Some(h) = self.task.take() {
            h.abort();
        }
    }
}

/// Run `tick` every `period`, first after one full period. Each tick is awaited
/// before the next is scheduled, so slow ticks delay rather than pile up.
/// The task ends when `tick` resolves to `false`.
pub fn every<F, Fut>(period: Duration, mut tick: F) -> CancelHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut iv = interval_at(Instant::now() + period, period);
        iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            iv.tick().await;
            if !tick().await {
                break;
            }
        }
    });
    CancelHandle { task: Some(task) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period_and_cancel_stops() {
        let n = Arc::new(AtomicUsize::new(0));
        let c = n.clone();
        let h = every(Duration::from_secs(1), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                true
            }
        });
        tokio::time::sleep(Duration::from_millis(990)).await;
        assert_eq!(n.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(n.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(n.load(Ordering::SeqCst), 3);
        h.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(n.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returning_false_ends_the_task() {
        let h = every(Duration::from_millis(100), || async { false });
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(h.is_finished());
    }
}
