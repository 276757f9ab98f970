use chrono::{DateTime, Utc};

/// A session's temporal extent, derived from its first and last event.
/// Session identity itself is just the `session_id` string used to name the
/// per-session log file and blob subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExtent {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionExtent {
    pub fn from_timestamps(first: DateTime<Utc>, last: DateTime<Utc>) -> Self {
        Self {
            start: first,
            end: last,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}
