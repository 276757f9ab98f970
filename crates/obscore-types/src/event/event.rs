use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::payload::EventPayload;

/// Immutable record describing something that happened in the runtime.
///
/// Invariants: `event_type` is non-empty; `timestamp` is assigned at
/// construction and never rewritten afterward; `session_id` is only
/// required for events that will be written to the event store, not for
/// every event (e.g. a bus listener may see events with no session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub data: EventPayload,
}

impl Event {
    /// Construct a new event, stamping the timestamp at this moment.
    /// Rejects an empty `event_type` per the data-model invariant.
    pub fn new(event_type: impl Into<String>, data: EventPayload) -> Result<Self> {
        let event_type = event_type.into();
        if event_type.is_empty() {
            return Err(Error::InvalidArgument(
                "event type must not be empty".to_string(),
            ));
        }
        Ok(Self {
            event_type,
            timestamp: Utc::now(),
            run_id: None,
            session_id: None,
            conversation_id: None,
            data,
        })
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Override the timestamp. Only meant for tests and replay fixtures
    /// that need deterministic, widely-spaced timestamps; production
    /// producers should rely on `new`'s wall-clock stamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::payload::MessagePayload;

    #[test]
    fn rejects_empty_type() {
        let err = Event::new(
            "",
            EventPayload::MessageCreated(MessagePayload {
                role: "user".into(),
                content: "hi".into(),
                ..Default::default()
            }),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn round_trips_through_json() {
        let event = Event::new(
            "message.created",
            EventPayload::MessageCreated(MessagePayload {
                role: "user".into(),
                content: "hello".into(),
                ..Default::default()
            }),
        )
        .unwrap()
        .with_session_id("s1");

        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type, "message.created");
        assert_eq!(back.session_id.as_deref(), Some("s1"));
    }
}
