use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::traits::PeriodicTask;

/// Handle to a running periodic task.
pub struct PeriodicHandle {
    name: String,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PeriodicHandle {
    /// Token that stops the task when cancelled; can be shared with a
    /// process-wide shutdown signal.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop scheduling ticks and wait for the loop to exit. Does not wait
    /// for the next tick.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!(task = %self.name, error = %e, "periodic task ended abnormally");
        }
    }
}

/// Spawn `task` on the tokio runtime. The first tick fires immediately.
/// Ticks missed while a previous tick is still running are skipped rather
/// than queued.
pub fn spawn_periodic(task: Arc<dyn PeriodicTask>, cancel: CancellationToken) -> PeriodicHandle {
    let name = task.name().to_string();
    let loop_cancel = cancel.clone();

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(task.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = loop_cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match task.tick().await {
                Ok(report) if report.skipped => {
                    tracing::debug!(task = task.name(), "tick skipped, previous run in flight");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(task = task.name(), error = %e, "periodic tick failed");
                }
            }
        }

        tracing::debug!(task = task.name(), "periodic task stopped");
    });

    PeriodicHandle { name, cancel, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::traits::TickReport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter {
        ticks: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PeriodicTask for Counter {
        async fn tick(&self) -> anyhow::Result<TickReport> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(TickReport {
                ran_at: chrono::Utc::now(),
                affected: 0,
                skipped: false,
            })
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(10)
        }

        fn name(&self) -> &str {
            "counter"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_interval_until_stopped() {
        let task = Arc::new(Counter {
            ticks: AtomicUsize::new(0),
            fail: false,
        });
        let handle = spawn_periodic(task.clone(), CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(task.ticks.load(Ordering::SeqCst), 3);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(task.ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_does_not_stop_the_loop() {
        let task = Arc::new(Counter {
            ticks: AtomicUsize::new(0),
            fail: true,
        });
        let handle = spawn_periodic(task.clone(), CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(task.ticks.load(Ordering::SeqCst), 4);
        assert!(!handle.is_finished());
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shared_token_cancels_the_loop() {
        let task = Arc::new(Counter {
            ticks: AtomicUsize::new(0),
            fail: false,
        });
        let shutdown = CancellationToken::new();
        let handle = spawn_periodic(task, shutdown.child_token());

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.is_finished());
        assert!(handle.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn stop_returns_without_waiting_for_next_tick() {
        let task = Arc::new(Counter {
            ticks: AtomicUsize::new(0),
            fail: false,
        });
        let handle = spawn_periodic(task.clone(), CancellationToken::new());

        // Let the immediate first tick run, then stop mid-interval.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let started = std::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("stop should not wait for the 10s interval");

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(task.ticks.load(Ordering::SeqCst), 1);
    }
}
