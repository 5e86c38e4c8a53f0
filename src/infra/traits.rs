use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one run of a periodic task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickReport {
    pub ran_at: DateTime<Utc>,
    /// Items the tick acted on (for the sweeper: sessions evicted).
    pub affected: usize,
    /// The tick found a previous run still in flight and did nothing.
    pub skipped: bool,
}

/// Background work driven on a fixed cadence by [`super::spawn_periodic`].
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    async fn tick(&self) -> anyhow::Result<TickReport>;
    fn interval(&self) -> Duration;
    fn name(&self) -> &str;
}
