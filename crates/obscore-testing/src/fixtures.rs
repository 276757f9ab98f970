//! Event builders that cut through the payload boilerplate so tests can
//! focus on the behavior under exercise rather than on constructing valid
//! `Event`s by hand.

use chrono::{DateTime, Utc};
use obscore_types::event::{AudioFormat, AudioPayload, MessagePayload, Phase, ToolCallLifecycle};
use obscore_types::{BinaryPayload, Event, EventPayload};

/// Timestamp `ms` milliseconds after the Unix epoch, used throughout these
/// fixtures to place events at deterministic offsets from a session start.
pub fn ts(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("valid millisecond offset")
}

/// A `message.created` event for `session_id` at `ms`, with `role` and
/// `content` as given.
pub fn message_event(session_id: &str, role: &str, content: &str, ms: i64) -> Event {
    Event::new(
        "message.created",
        EventPayload::MessageCreated(MessagePayload {
            role: role.to_string(),
            content: content.to_string(),
            ..Default::default()
        }),
    )
    .expect("non-empty event type")
    .with_session_id(session_id)
    .with_timestamp(ts(ms))
}

/// A started/completed `tool.call` event pair's single leg — pass
/// [`Phase::Started`] or [`Phase::Completed`] for `phase`.
pub fn tool_call_event(session_id: &str, tool_name: &str, call_id: &str, phase: Phase, ms: i64) -> Event {
    let event_type = match phase {
        Phase::Started => "tool.call.started",
        Phase::Completed => "tool.call.completed",
        Phase::Failed => "tool.call.failed",
    };
    Event::new(
        event_type,
        EventPayload::ToolCall(ToolCallLifecycle {
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            phase: Some(phase),
            ..Default::default()
        }),
    )
    .expect("non-empty event type")
    .with_session_id(session_id)
    .with_timestamp(ts(ms))
}

/// An inline `audio.input` or `audio.output` event carrying `bytes` of
/// payload, `duration_ms` long, at chunk `chunk_index`.
pub fn audio_event(
    session_id: &str,
    direction: AudioDirection,
    bytes: Vec<u8>,
    duration_ms: u64,
    chunk_index: u64,
    is_final: bool,
    ms: i64,
) -> Event {
    let payload = AudioPayload {
        payload: BinaryPayload::inline(bytes, "audio/pcm"),
        format: AudioFormat::default(),
        duration_ms,
        chunk_index,
        is_final,
    };
    let (event_type, data) = match direction {
        AudioDirection::Input => ("audio.input", EventPayload::AudioInput(payload)),
        AudioDirection::Output => ("audio.output", EventPayload::AudioOutput(payload)),
    };
    Event::new(event_type, data)
        .expect("non-empty event type")
        .with_session_id(session_id)
        .with_timestamp(ts(ms))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDirection {
    Input,
    Output,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_event_carries_session_and_timestamp() {
        let event = message_event("s1", "user", "hi", 100);
        assert_eq!(event.session_id.as_deref(), Some("s1"));
        assert_eq!(event.timestamp, ts(100));
    }
}
