//! In-memory session store implementation.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{
    Clock, HostNetwork, Identity, SessionError, SessionIdGenerator, SessionRecord, SessionResult,
    SessionStore,
};

/// Random v4 UUIDs rendered in hyphenated form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl SessionIdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

struct Slot {
    seq: u64,
    record: SessionRecord,
}

#[derive(Default)]
struct Sessions {
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

/// An in-memory session store backed by a single mutex-protected map.
///
/// The lock is held for the whole of each operation and never across an
/// `.await`, so operations on the same id are totally ordered.
pub struct InMemorySessionStore {
    sessions: Mutex<Sessions>,
    clock: Arc<dyn Clock>,
    network: Arc<dyn HostNetwork>,
    ids: Arc<dyn SessionIdGenerator>,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>, network: Arc<dyn HostNetwork>) -> Self {
        Self::with_id_generator(clock, network, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(
        clock: Arc<dyn Clock>,
        network: Arc<dyn HostNetwork>,
        ids: Arc<dyn SessionIdGenerator>,
    ) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            clock,
            network,
            ids,
        }
    }
}

fn require(value: &str, field: &'static str) -> SessionResult<()> {
    if value.trim().is_empty() {
        return Err(SessionError::InvalidInput { field });
    }
    Ok(())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        identity: Identity,
        client_address: &str,
    ) -> SessionResult<SessionRecord> {
        require(&identity.email, "email")?;
        require(&identity.nickname, "nickname")?;
        require(client_address, "macAddress")?;

        let id = self.ids.generate();
        let now = self.clock.now();
        let record = SessionRecord {
            id: id.clone(),
            identity,
            client_address: client_address.to_string(),
            server_network: self.network.current(),
            created_at: now,
            last_accessed_at: now,
        };

        let mut sessions = self.sessions.lock();
        if sessions.slots.contains_key(&id) {
            tracing::error!(session_id = %id, "generated session id collides with a live session");
            return Err(SessionError::Internal(format!("session id collision: {id}")));
        }
        let seq = sessions.next_seq;
        sessions.next_seq += 1;
        sessions.slots.insert(
            id.clone(),
            Slot {
                seq,
                record: record.clone(),
            },
        );
        drop(sessions);

        tracing::debug!(session_id = %id, "session created");
        Ok(record)
    }

    async fn get(&self, id: &str) -> SessionResult<SessionRecord> {
        let sessions = self.sessions.lock();
        sessions
            .slots
            .get(id)
            .map(|slot| slot.record.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn touch(&self, id: &str) -> SessionResult<SessionRecord> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        match sessions.slots.get_mut(id) {
            Some(slot) => {
                let record = &mut slot.record;
                record.last_accessed_at = now.max(record.created_at);
                Ok(record.clone())
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, id: &str) -> SessionResult<SessionRecord> {
        let removed = self.sessions.lock().slots.remove(id);
        match removed {
            Some(slot) => {
                tracing::debug!(session_id = %id, "session deleted");
                Ok(slot.record)
            }
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn list(&self) -> Vec<SessionRecord> {
        let sessions = self.sessions.lock();
        let mut slots: Vec<&Slot> = sessions.slots.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.record.clone()).collect()
    }

    async fn sweep(&self, now: DateTime<Utc>, threshold: TimeDelta) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.slots.len();
        sessions
            .slots
            .retain(|_, slot| !slot.record.is_idle_past(now, threshold));
        let evicted = before - sessions.slots.len();
        drop(sessions);

        if evicted > 0 {
            tracing::debug!(evicted, "idle sessions swept");
        }
        evicted
    }

    async fn idle_duration(&self, id: &str, now: DateTime<Utc>) -> SessionResult<TimeDelta> {
        let sessions = self.sessions.lock();
        sessions
            .slots
            .get(id)
            .map(|slot| slot.record.idle_duration(now))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn len(&self) -> usize {
        self.sessions.lock().slots.len()
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
