use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::event::{Event, EventPayload};

/// The on-disk serialization form of an event.
///
/// `data` is kept as an opaque, pre-serialized JSON blob rather than the
/// typed `EventPayload` so a reader never has to understand every producer's
/// payload shape to replay the log — "core replay treats `data` as opaque
/// until a consumer resolves it". `data_type` is the serde tag lifted out of
/// the payload so callers can filter/dispatch without parsing `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    pub event: StoredEventBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEventBody {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<RawValue>>,
}

fn data_as_value(data: &RawValue) -> serde_json::Value {
    serde_json::from_str(data.get()).unwrap_or(serde_json::Value::Null)
}

impl StoredEvent {
    /// Build the on-disk form from a live `Event`, assigning `seq`.
    pub fn from_event(seq: u64, parent_id: Option<u64>, event: &Event) -> crate::error::Result<Self> {
        let envelope = serde_json::to_value(&event.data)?;
        let data_type = envelope
            .get("kind")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let data = envelope.get("data").cloned().unwrap_or(envelope);
        let raw = RawValue::from_string(serde_json::to_string(&data)?)?;

        Ok(Self {
            seq,
            parent_id,
            event: StoredEventBody {
                event_type: event.event_type.clone(),
                timestamp: event.timestamp,
                run_id: event.run_id.clone(),
                session_id: event.session_id.clone(),
                conversation_id: event.conversation_id.clone(),
                data_type,
                data: Some(raw),
            },
        })
    }

    /// Reconstitute a typed `Event`, re-tagging `data_type`/`data` back into
    /// the `EventPayload` shape they were lifted out of in `from_event`.
    /// An absent `data_type`/`data` pair, or one whose discriminator this
    /// reader doesn't model, decodes as `EventPayload::Unknown` rather than
    /// failing — "Consumers MUST tolerate unknown types" (spec §6) applies
    /// to the store's own readers too, since producers may run code newer
    /// than the reader.
    pub fn to_event(&self) -> crate::error::Result<Event> {
        let body = &self.event;
        let data = match (&body.data_type, &body.data) {
            (Some(kind), Some(data)) => {
                let envelope = serde_json::json!({ "kind": kind, "data": data });
                serde_json::from_value::<EventPayload>(envelope)
                    .unwrap_or_else(|_| EventPayload::Unknown(data_as_value(data)))
            }
            (None, Some(data)) => EventPayload::Unknown(data_as_value(data)),
            _ => EventPayload::Unknown(serde_json::Value::Null),
        };

        Ok(Event {
            event_type: body.event_type.clone(),
            timestamp: body.timestamp,
            run_id: body.run_id.clone(),
            session_id: body.session_id.clone(),
            conversation_id: body.conversation_id.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, MessagePayload};

    #[test]
    fn preserves_discriminator_opaquely() {
        let event = Event::new(
            "message.created",
            EventPayload::MessageCreated(MessagePayload {
                role: "user".into(),
                content: "hi".into(),
                ..Default::default()
            }),
        )
        .unwrap()
        .with_session_id("s1");

        let stored = StoredEvent::from_event(1, None, &event).unwrap();
        assert_eq!(stored.event.data_type.as_deref(), Some("message_created"));
        let line = serde_json::to_string(&stored).unwrap();
        let back: StoredEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back.seq, 1);
        assert_eq!(back.event.event_type, "message.created");
    }

    #[test]
    fn to_event_recovers_typed_payload() {
        let event = Event::new(
            "message.created",
            EventPayload::MessageCreated(MessagePayload {
                role: "assistant".into(),
                content: "hi there".into(),
                ..Default::default()
            }),
        )
        .unwrap()
        .with_session_id("s1");

        let stored = StoredEvent::from_event(7, None, &event).unwrap();
        let recovered = stored.to_event().unwrap();
        match recovered.data {
            EventPayload::MessageCreated(payload) => {
                assert_eq!(payload.role, "assistant");
                assert_eq!(payload.content, "hi there");
            }
            other => panic!("expected MessageCreated, got {other:?}"),
        }
    }

    #[test]
    fn to_event_unknown_discriminator_decodes_as_unknown() {
        let body = StoredEventBody {
            event_type: "custom.thing".into(),
            timestamp: chrono::Utc::now(),
            run_id: None,
            session_id: Some("s1".into()),
            conversation_id: None,
            data_type: Some("something_unmodeled".into()),
            data: Some(RawValue::from_string("{\"x\":1}".into()).unwrap()),
        };
        let stored = StoredEvent {
            seq: 1,
            parent_id: None,
            event: body,
        };
        let recovered = stored.to_event().unwrap();
        assert!(matches!(recovered.data, EventPayload::Unknown(_)));
    }
}
