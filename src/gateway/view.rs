//! JSON shapes and display strings for session responses.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::sessions::SessionRecord;

/// A session as rendered to HTTP clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub email: String,
    pub nickname: String,
    pub mac_address: String,
    pub ip: Option<String>,
    pub server_mac: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl From<SessionRecord> for SessionView {
    fn from(record: SessionRecord) -> Self {
        Self {
            session_id: record.id,
            email: record.identity.email,
            nickname: record.identity.nickname,
            mac_address: record.client_address,
            ip: record.server_network.ip,
            server_mac: record.server_network.mac,
            created_at: record.created_at,
            last_accessed: record.last_accessed_at,
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` in the given timezone.
pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Whole-second breakdown, e.g. `"1 hours, 2 minutes, 5 seconds"`.
pub fn format_inactivity(idle: TimeDelta) -> String {
    let total = idle.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours} hours, {minutes} minutes, {seconds} seconds")
}
