//! Idle-session eviction.
//!
//! The sweeper alternates strictly between [`SweeperState::Idle`] and
//! [`SweeperState::Sweeping`]. A sweep requested while another is in flight
//! is skipped, never queued.

use async_trait::async_trait;
use chrono::TimeDelta;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::periodic::{spawn_periodic, PeriodicHandle};
use super::traits::{PeriodicTask, TickReport};
use crate::sessions::{Clock, SessionStore};

/// How often to sweep and how long a session may sit idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    interval: Duration,
    idle_threshold: Duration,
}

impl SweepPolicy {
    /// The interval must be non-zero and the threshold at least one interval.
    pub fn new(interval: Duration, idle_threshold: Duration) -> anyhow::Result<Self> {
        if interval.is_zero() {
            anyhow::bail!("sweep interval must be greater than zero");
        }
        if idle_threshold < interval {
            anyhow::bail!(
                "idle threshold ({}s) must be at least the sweep interval ({}s)",
                idle_threshold.as_secs(),
                interval.as_secs()
            );
        }
        TimeDelta::from_std(idle_threshold)
            .map_err(|_| anyhow::anyhow!("idle threshold is out of range"))?;
        Ok(Self {
            interval,
            idle_threshold,
        })
    }

    pub fn from_secs(interval_secs: u64, idle_threshold_secs: u64) -> anyhow::Result<Self> {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(idle_threshold_secs),
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    fn threshold_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.idle_threshold).unwrap_or(TimeDelta::MAX)
    }
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    Idle,
    Sweeping,
}

/// Resets the in-flight flag even if the sweep future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodically evicts sessions idle past the policy threshold.
pub struct EvictionSweeper {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: SweepPolicy,
    sweeping: AtomicBool,
    total_evicted: AtomicU64,
}

impl EvictionSweeper {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, policy: SweepPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            sweeping: AtomicBool::new(false),
            total_evicted: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> SweepPolicy {
        self.policy
    }

    pub fn state(&self) -> SweeperState {
        if self.sweeping.load(Ordering::Acquire) {
            SweeperState::Sweeping
        } else {
            SweeperState::Idle
        }
    }

    /// Sessions evicted since this sweeper was created.
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted.load(Ordering::Relaxed)
    }

    /// Run one sweep now. Returns `None` if a sweep was already in flight.
    pub async fn run_once(&self) -> Option<usize> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let _in_flight = InFlight(&self.sweeping);

        let now = self.clock.now();
        let evicted = self.store.sweep(now, self.policy.threshold_delta()).await;
        self.total_evicted.fetch_add(evicted as u64, Ordering::Relaxed);

        if evicted > 0 {
            let remaining = self.store.len().await;
            tracing::info!(evicted, remaining, "expired sessions evicted");
        } else {
            tracing::debug!("sweep found no expired sessions");
        }
        Some(evicted)
    }

    /// Start sweeping on the policy interval until the handle is stopped.
    pub fn start(self: Arc<Self>) -> PeriodicHandle {
        self.start_with(CancellationToken::new())
    }

    pub fn start_with(self: Arc<Self>, cancel: CancellationToken) -> PeriodicHandle {
        tracing::info!(
            interval_secs = self.policy.interval.as_secs(),
            idle_threshold_secs = self.policy.idle_threshold.as_secs(),
            store = self.store.name(),
            "session sweeper started"
        );
        spawn_periodic(self, cancel)
    }
}

#[async_trait]
impl PeriodicTask for EvictionSweeper {
    async fn tick(&self) -> anyhow::Result<TickReport> {
        let ran_at = self.clock.now();
        let report = match self.run_once().await {
            Some(affected) => TickReport {
                ran_at,
                affected,
                skipped: false,
            },
            None => TickReport {
                ran_at,
                affected: 0,
                skipped: true,
            },
        };
        Ok(report)
    }

    fn interval(&self) -> Duration {
        self.policy.interval
    }

    fn name(&self) -> &str {
        "session_sweeper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{
        Identity, InMemorySessionStore, ManualClock, SessionRecord, SessionResult, StaticNetwork,
    };
    use chrono::{DateTime, Utc};
    use tokio::sync::Notify;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs)
    }

    fn fixture() -> (Arc<ManualClock>, Arc<InMemorySessionStore>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(InMemorySessionStore::new(
            clock.clone(),
            Arc::new(StaticNetwork::default()),
        ));
        (clock, store)
    }

    #[test]
    fn policy_rejects_threshold_below_interval() {
        assert!(SweepPolicy::from_secs(60, 30).is_err());
        assert!(SweepPolicy::from_secs(0, 30).is_err());
        assert!(SweepPolicy::from_secs(60, 60).is_ok());

        let policy = SweepPolicy::default();
        assert_eq!(policy.interval(), Duration::from_secs(60));
        assert_eq!(policy.idle_threshold(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn run_once_evicts_only_idle_sessions() {
        let (clock, store) = fixture();
        let stale = store.create(Identity::new("a@x.com", "a"), "AA:BB").await.unwrap();
        clock.set(at(100));
        let fresh = store.create(Identity::new("b@x.com", "b"), "CC:DD").await.unwrap();
        clock.set(at(130));

        let sweeper = EvictionSweeper::new(store.clone(), clock.clone(), SweepPolicy::default());
        assert_eq!(sweeper.run_once().await, Some(1));
        assert_eq!(sweeper.run_once().await, Some(0));
        assert_eq!(sweeper.total_evicted(), 1);
        assert_eq!(sweeper.state(), SweeperState::Idle);

        assert!(store.get(&stale.id).await.is_err());
        assert!(store.get(&fresh.id).await.is_ok());
    }

    /// Delegates to an in-memory store but parks inside `sweep` until released.
    struct GatedStore {
        inner: InMemorySessionStore,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SessionStore for GatedStore {
        async fn create(
            &self,
            identity: Identity,
            client_address: &str,
        ) -> SessionResult<SessionRecord> {
            self.inner.create(identity, client_address).await
        }
        async fn get(&self, id: &str) -> SessionResult<SessionRecord> {
            self.inner.get(id).await
        }
        async fn touch(&self, id: &str) -> SessionResult<SessionRecord> {
            self.inner.touch(id).await
        }
        async fn delete(&self, id: &str) -> SessionResult<SessionRecord> {
            self.inner.delete(id).await
        }
        async fn list(&self) -> Vec<SessionRecord> {
            self.inner.list().await
        }
        async fn sweep(&self, now: DateTime<Utc>, threshold: TimeDelta) -> usize {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.sweep(now, threshold).await
        }
        async fn idle_duration(&self, id: &str, now: DateTime<Utc>) -> SessionResult<TimeDelta> {
            self.inner.idle_duration(id, now).await
        }
        async fn len(&self) -> usize {
            self.inner.len().await
        }
        fn name(&self) -> &str {
            "gated"
        }
    }

    #[tokio::test]
    async fn overlapping_sweep_is_skipped() {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(GatedStore {
            inner: InMemorySessionStore::new(clock.clone(), Arc::new(StaticNetwork::default())),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let sweeper = Arc::new(EvictionSweeper::new(
            store.clone(),
            clock.clone(),
            SweepPolicy::default(),
        ));

        let first = tokio::spawn({
            let sweeper = sweeper.clone();
            async move { sweeper.run_once().await }
        });
        store.entered.notified().await;
        assert_eq!(sweeper.state(), SweeperState::Sweeping);

        assert_eq!(sweeper.run_once().await, None);
        let report = sweeper.tick().await.unwrap();
        assert!(report.skipped);

        store.release.notify_one();
        assert_eq!(first.await.unwrap(), Some(0));
        assert_eq!(sweeper.state(), SweeperState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn started_sweeper_evicts_on_schedule_and_stops() {
        let (clock, store) = fixture();
        let id = store.create(Identity::new("a@x.com", "a"), "AA:BB").await.unwrap().id;

        let sweeper = Arc::new(EvictionSweeper::new(
            store.clone(),
            clock.clone(),
            SweepPolicy::default(),
        ));
        let handle = sweeper.clone().start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(store.get(&id).await.is_ok());

        clock.set(at(121));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.get(&id).await.is_err());
        assert_eq!(sweeper.total_evicted(), 1);

        handle.stop().await;
        let survivor = store.create(Identity::new("b@x.com", "b"), "CC:DD").await.unwrap();
        clock.set(at(1_000));
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(store.get(&survivor.id).await.is_ok());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn run_once_future_can_move_across_threads() {
        let (clock, store) = fixture();
        store.create(Identity::new("a@x.com", "a"), "AA:BB").await.unwrap();
        clock.set(at(500));

        let sweeper = Arc::new(EvictionSweeper::new(store.clone(), clock, SweepPolicy::default()));
        let sweep = sweeper.run_once();
        assert_send(&sweep);
        assert_eq!(sweep.await, Some(1));

        let evicted = tokio::spawn({
            let sweeper = sweeper.clone();
            async move { sweeper.run_once().await }
        })
        .await
        .unwrap();
        assert_eq!(evicted, Some(0));
        assert_eq!(sweeper.total_evicted(), 1);
    }
}
