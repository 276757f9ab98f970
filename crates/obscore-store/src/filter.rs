use chrono::{DateTime, Utc};
use obscore_types::StoredEvent;

/// Predicate evaluated against stored events by `Query`/`Stream`.
/// `session_id` is mandatory; everything else narrows the match further
/// when present.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub session_id: String,
    pub conversation_id: Option<String>,
    pub run_id: Option<String>,
    pub types: Option<Vec<String>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, stored: &StoredEvent) -> bool {
        let body = &stored.event;

        if body.session_id.as_deref() != Some(self.session_id.as_str()) {
            return false;
        }
        if let Some(conversation_id) = &self.conversation_id {
            if !conversation_id.is_empty() && body.conversation_id.as_deref() != Some(conversation_id.as_str())
            {
                return false;
            }
        }
        if let Some(run_id) = &self.run_id {
            if !run_id.is_empty() && body.run_id.as_deref() != Some(run_id.as_str()) {
                return false;
            }
        }
        if let Some(types) = &self.types {
            if !types.is_empty() && !types.iter().any(|t| t == &body.event_type) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if body.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if body.timestamp >= until {
                return false;
            }
        }
        true
    }
}
