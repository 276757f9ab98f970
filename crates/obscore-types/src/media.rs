use serde::{Deserialize, Serialize};

use crate::binary::BinaryPayload;
use crate::event::AudioFormat;

/// Which typed track a segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    AudioInput,
    AudioOutput,
    Video,
}

/// Per-track format metadata: audio tracks carry an `AudioFormat`, video
/// tracks carry frame dimensions/encoding. Kept as an enum (rather than two
/// optional fields) so a track's format is always self-consistent with its
/// `TrackType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackFormat {
    Audio(AudioFormat),
    Video { width: u32, height: u32, encoding: String },
}

/// A contiguous media fragment within a track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSegment {
    /// Offset from session start.
    pub start_time_ms: i64,
    pub duration_ms: u64,
    pub payload: BinaryPayload,
    pub format: TrackFormat,
    /// Index of the event this segment was derived from.
    pub origin_event_index: usize,
    /// Chunk index (audio) or frame index (video); used to order segments
    /// independently of wall-clock timestamp.
    pub sequence: u64,
}

/// Ordered sequence of segments of one track type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTrack {
    pub track_type: TrackType,
    pub segments: Vec<MediaSegment>,
    pub total_duration_ms: u64,
    pub format: Option<TrackFormat>,
}

impl MediaTrack {
    pub fn empty(track_type: TrackType) -> Self {
        Self {
            track_type,
            segments: Vec::new(),
            total_duration_ms: 0,
            format: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Locate the segment containing offset `t` and the position within it.
    /// Returns `None` if `t` is at or beyond the track's total duration.
    /// Walks segments accumulating durations and returns the first one
    /// whose cumulative extent exceeds `t`.
    pub fn offset_in_segment(&self, t_ms: u64) -> Option<(&MediaSegment, u64)> {
        if t_ms >= self.total_duration_ms {
            return None;
        }
        let mut accumulated = 0u64;
        for segment in &self.segments {
            let next = accumulated + segment.duration_ms;
            if t_ms < next {
                return Some((segment, t_ms - accumulated));
            }
            accumulated = next;
        }
        None
    }
}
