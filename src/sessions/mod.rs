//! Session management: the session store, its record types and clocks.

pub mod clock;
pub mod in_memory;
pub mod network;
pub mod traits;

pub use clock::{ManualClock, SystemClock};
pub use in_memory::{InMemorySessionStore, UuidGenerator};
pub use network::{LocalInterfaceProbe, StaticNetwork};
pub use traits::{
    Clock, HostNetwork, Identity, ServerNetwork, SessionError, SessionIdGenerator, SessionRecord,
    SessionResult, SessionStore,
};

use std::sync::Arc;

/// Create a default in-memory session store.
pub fn create_session_store(
    clock: Arc<dyn Clock>,
    network: Arc<dyn HostNetwork>,
) -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new(clock, network))
}
