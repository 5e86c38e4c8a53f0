//! Session storage traits and types for login sessions.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied identity attached to a session at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub nickname: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            nickname: nickname.into(),
        }
    }
}

/// Network interface of the host process, captured when a session is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerNetwork {
    pub ip: Option<String>,
    pub mac: Option<String>,
}

/// A tracked login session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub identity: Identity,
    /// MAC-like identifier reported by the client. Opaque to the store.
    pub client_address: String,
    pub server_network: ServerNetwork,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Time since the last touch, saturating at zero.
    pub fn idle_duration(&self, now: DateTime<Utc>) -> TimeDelta {
        (now - self.last_accessed_at).max(TimeDelta::zero())
    }

    /// Whether the session has been idle for strictly longer than `threshold`.
    pub fn is_idle_past(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        self.idle_duration(now) > threshold
    }
}

/// Errors returned by session store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("missing required field: {field}")]
    InvalidInput { field: &'static str },

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("internal session store error: {0}")]
    Internal(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Source of "now" for timestamps and idle calculations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Provides the host's network attributes at session creation time.
pub trait HostNetwork: Send + Sync {
    fn current(&self) -> ServerNetwork;
}

/// Produces session identifiers. Implementations must not be sequential.
pub trait SessionIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Authoritative owner of all live session records.
///
/// Every operation is serialized against the others; callers only ever
/// receive copies of records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session for `identity` logged in from `client_address`.
    async fn create(&self, identity: Identity, client_address: &str)
        -> SessionResult<SessionRecord>;

    /// Look up a session without affecting its idle timer.
    async fn get(&self, id: &str) -> SessionResult<SessionRecord>;

    /// Mark a session active now and return the updated record.
    async fn touch(&self, id: &str) -> SessionResult<SessionRecord>;

    /// Remove a session, returning the record that was removed.
    async fn delete(&self, id: &str) -> SessionResult<SessionRecord>;

    /// Snapshot of live sessions in creation order.
    async fn list(&self) -> Vec<SessionRecord>;

    /// Remove every session idle for longer than `threshold` at `now`.
    /// Returns the number of sessions removed.
    async fn sweep(&self, now: DateTime<Utc>, threshold: TimeDelta) -> usize;

    /// Idle time of a session at `now`.
    async fn idle_duration(&self, id: &str, now: DateTime<Utc>) -> SessionResult<TimeDelta>;

    /// Number of live sessions.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
