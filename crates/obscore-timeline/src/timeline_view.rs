use obscore_types::{Annotation, AnnotationTarget, Event, MediaSegment, StoredEvent, TrackType};

use crate::track::MediaTimeline;

/// One entry in a unified chronological view composed of events,
/// annotations, and media segments, each tagged with its origin and
/// millisecond offset from session start. Built for UI-facing consumers;
/// not used by either player.
#[derive(Debug, Clone)]
pub enum TimelineEntry {
    Event { offset_ms: i64, event: Event },
    Annotation { offset_ms: i64, annotation: Annotation },
    Segment { offset_ms: i64, track_type: TrackType, segment: MediaSegment },
}

impl TimelineEntry {
    pub fn offset_ms(&self) -> i64 {
        match self {
            TimelineEntry::Event { offset_ms, .. } => *offset_ms,
            TimelineEntry::Annotation { offset_ms, .. } => *offset_ms,
            TimelineEntry::Segment { offset_ms, .. } => *offset_ms,
        }
    }
}

pub fn timeline_view(
    stored_events: &[StoredEvent],
    events: &[Event],
    annotations: &[Annotation],
    timeline: &MediaTimeline,
) -> Vec<TimelineEntry> {
    let first_ts = events.first().map(|e| e.timestamp);

    let mut entries: Vec<TimelineEntry> = Vec::new();

    for event in events {
        let offset_ms = first_ts.map(|ts| (event.timestamp - ts).num_milliseconds()).unwrap_or(0);
        entries.push(TimelineEntry::Event {
            offset_ms,
            event: event.clone(),
        });
    }

    for annotation in annotations {
        let event_ts_ms = match &annotation.target {
            AnnotationTarget::Event { sequence } => stored_events
                .iter()
                .find(|s| s.seq == *sequence)
                .zip(first_ts)
                .map(|(s, first)| (s.event.timestamp - first).num_milliseconds()),
            _ => None,
        };
        let offset_ms = annotation.effective_time_ms(event_ts_ms);
        entries.push(TimelineEntry::Annotation {
            offset_ms,
            annotation: annotation.clone(),
        });
    }

    for (track_type, track) in [
        (TrackType::AudioInput, &timeline.audio_input),
        (TrackType::AudioOutput, &timeline.audio_output),
        (TrackType::Video, &timeline.video),
    ] {
        for segment in &track.segments {
            entries.push(TimelineEntry::Segment {
                offset_ms: segment.start_time_ms,
                track_type,
                segment: segment.clone(),
            });
        }
    }

    // Stable sort: entries that tie on offset keep their insertion order
    // (events, then annotations, then segments) rather than being shuffled
    // by an unstable comparator.
    entries.sort_by_key(|entry| entry.offset_ms());
    entries
}
