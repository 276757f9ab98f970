use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use obscore_blob::BlobStore;
use obscore_store::{EventFilter, EventStore};
use obscore_types::{Annotation, AnnotationKind, Event, EventPayload, StoredEvent};
use tokio_util::sync::CancellationToken;

use crate::annotation_source::AnnotationSource;
use crate::error::{Error, Result};
use crate::timeline_view::{timeline_view, TimelineEntry};
use crate::track::MediaTimeline;

/// Aggregate statistics computed in one pass over a session's events.
#[derive(Debug, Clone, Default)]
pub struct SessionMetadata {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration: Option<chrono::Duration>,
    pub event_counts_by_type: HashMap<String, u64>,
    pub has_audio_input: bool,
    pub has_audio_output: bool,
    pub has_video: bool,
    pub audio_input_duration_ms: u64,
    pub audio_output_duration_ms: u64,
    pub tool_call_count: u64,
    pub provider_call_count: u64,
    pub conversation_turn_count: u64,
    pub annotation_counts_by_kind: HashMap<AnnotationKind, u64>,
}

impl SessionMetadata {
    fn compute(events: &[Event], annotations: &[Annotation]) -> Self {
        let mut metadata = SessionMetadata::default();
        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            metadata.start = Some(first.timestamp);
            metadata.end = Some(last.timestamp);
            metadata.duration = Some(last.timestamp - first.timestamp);
        }

        for event in events {
            *metadata.event_counts_by_type.entry(event.event_type.clone()).or_insert(0) += 1;
            match &event.data {
                EventPayload::AudioInput(audio) => {
                    metadata.has_audio_input = true;
                    metadata.audio_input_duration_ms += audio.duration_ms;
                }
                EventPayload::AudioOutput(audio) => {
                    metadata.has_audio_output = true;
                    metadata.audio_output_duration_ms += audio.duration_ms;
                }
                EventPayload::VideoFrame(_) => {
                    metadata.has_video = true;
                }
                EventPayload::ToolCall(_) => {
                    metadata.tool_call_count += 1;
                }
                EventPayload::ProviderCall(_) => {
                    metadata.provider_call_count += 1;
                }
                EventPayload::MessageCreated(message) if message.role == "user" => {
                    metadata.conversation_turn_count += 1;
                }
                _ => {}
            }
        }

        for annotation in annotations {
            *metadata.annotation_counts_by_kind.entry(annotation.kind).or_insert(0) += 1;
        }

        metadata
    }
}

/// A session fully materialized for replay and inspection: its events,
/// annotations, media timeline, and (optionally) aggregate metadata.
pub struct AnnotatedSession {
    pub session_id: String,
    pub stored_events: Vec<StoredEvent>,
    pub events: Vec<Event>,
    pub annotations: Vec<Annotation>,
    pub timeline: MediaTimeline,
    pub metadata: Option<SessionMetadata>,
    pub blob_store: Option<BlobStore>,
}

impl AnnotatedSession {
    /// Unified chronological view of events, annotations, and media
    /// segments for UI-facing consumers. Not used by either player.
    pub fn timeline_view(&self) -> Vec<TimelineEntry> {
        timeline_view(&self.stored_events, &self.events, &self.annotations, &self.timeline)
    }
}

/// Composite loader: fetches events via the event store, annotations via
/// an `AnnotationSource`, builds a `MediaTimeline`, and optionally computes
/// `SessionMetadata`.
pub struct AnnotatedSessionLoader {
    event_store: Arc<EventStore>,
    annotation_source: Arc<dyn AnnotationSource>,
    blob_store: Option<BlobStore>,
    compute_metadata: bool,
}

impl AnnotatedSessionLoader {
    pub fn new(event_store: Arc<EventStore>, annotation_source: Arc<dyn AnnotationSource>) -> Self {
        Self {
            event_store,
            annotation_source,
            blob_store: None,
            compute_metadata: true,
        }
    }

    pub fn with_blob_store(mut self, blob_store: BlobStore) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    pub fn with_metadata(mut self, compute_metadata: bool) -> Self {
        self.compute_metadata = compute_metadata;
        self
    }

    pub async fn load(&self, session_id: impl Into<String>) -> Result<AnnotatedSession> {
        let session_id = session_id.into();
        let cancel = CancellationToken::new();
        let stored_events = self
            .event_store
            .query(&cancel, &EventFilter::for_session(&session_id))
            .await?;

        let events = stored_events
            .iter()
            .map(|s| s.to_event())
            .collect::<std::result::Result<Vec<Event>, _>>()
            .map_err(Error::Types)?;

        let annotations = self.annotation_source.load(&session_id)?;

        let timeline = MediaTimeline::build(&session_id, &events);
        let metadata = self.compute_metadata.then(|| SessionMetadata::compute(&events, &annotations));

        Ok(AnnotatedSession {
            session_id,
            stored_events,
            events,
            annotations,
            timeline,
            metadata,
            blob_store: self.blob_store.clone(),
        })
    }
}
