pub mod periodic;
pub mod sweeper;
pub mod traits;

pub use periodic::{spawn_periodic, PeriodicHandle};
pub use sweeper::{EvictionSweeper, SweepPolicy, SweeperState};
pub use traits::{PeriodicTask, TickReport};

use std::sync::Arc;

use crate::sessions::{Clock, SessionStore};

pub fn create_sweeper(
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: SweepPolicy,
) -> Arc<EvictionSweeper> {
    Arc::new(EvictionSweeper::new(store, clock, policy))
}
