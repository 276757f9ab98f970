use obscore_types::event::{AudioPayload, VideoFramePayload};
use obscore_types::{Event, EventPayload, MediaSegment, MediaTrack, SessionExtent, TrackFormat, TrackType};

/// Typed, seekable reshaping of a session's events.
///
/// Built once from a sorted event list and held immutable afterward;
/// readers and players borrow from it rather than re-deriving tracks per
/// playback.
#[derive(Debug, Clone)]
pub struct MediaTimeline {
    pub session_id: String,
    pub extent: SessionExtent,
    pub audio_input: MediaTrack,
    pub audio_output: MediaTrack,
    pub video: MediaTrack,
}

impl MediaTimeline {
    /// Build tracks from `events`, which must already be sorted by
    /// timestamp. Empty input yields empty tracks anchored at the zero
    /// timestamp.
    pub fn build(session_id: impl Into<String>, events: &[Event]) -> Self {
        let session_id = session_id.into();
        let extent = match (events.first(), events.last()) {
            (Some(first), Some(last)) => SessionExtent::from_timestamps(first.timestamp, last.timestamp),
            _ => SessionExtent::from_timestamps(chrono::Utc::now(), chrono::Utc::now()),
        };

        let mut audio_input = Vec::new();
        let mut audio_output = Vec::new();
        let mut video = Vec::new();

        for (index, event) in events.iter().enumerate() {
            let offset_ms = (event.timestamp - extent.start).num_milliseconds();
            match &event.data {
                EventPayload::AudioInput(audio) => {
                    audio_input.push(audio_segment(audio, offset_ms, index));
                }
                EventPayload::AudioOutput(audio) => {
                    audio_output.push(audio_segment(audio, offset_ms, index));
                }
                EventPayload::VideoFrame(frame) => {
                    video.push(video_segment(frame, offset_ms, index));
                }
                _ => {}
            }
        }

        Self {
            session_id,
            extent,
            audio_input: finish_track(TrackType::AudioInput, audio_input),
            audio_output: finish_track(TrackType::AudioOutput, audio_output),
            video: finish_video_track(video),
        }
    }

    pub fn track(&self, track_type: TrackType) -> &MediaTrack {
        match track_type {
            TrackType::AudioInput => &self.audio_input,
            TrackType::AudioOutput => &self.audio_output,
            TrackType::Video => &self.video,
        }
    }

    /// Total extent across every non-empty track, used to bound playback.
    pub fn total_duration_ms(&self) -> u64 {
        [&self.audio_input, &self.audio_output, &self.video]
            .into_iter()
            .map(|t| t.total_duration_ms)
            .max()
            .unwrap_or(0)
    }
}

fn audio_segment(audio: &AudioPayload, offset_ms: i64, index: usize) -> MediaSegment {
    MediaSegment {
        start_time_ms: offset_ms,
        duration_ms: audio.duration_ms,
        payload: audio.payload.clone(),
        format: TrackFormat::Audio(audio.format.clone()),
        origin_event_index: index,
        sequence: audio.chunk_index,
    }
}

fn video_segment(frame: &VideoFramePayload, offset_ms: i64, index: usize) -> MediaSegment {
    MediaSegment {
        start_time_ms: offset_ms,
        duration_ms: 0,
        payload: frame.payload.clone(),
        format: TrackFormat::Video {
            width: frame.width,
            height: frame.height,
            encoding: frame.encoding.clone(),
        },
        origin_event_index: index,
        sequence: frame.frame_index,
    }
}

fn finish_track(track_type: TrackType, mut segments: Vec<MediaSegment>) -> MediaTrack {
    segments.sort_by_key(|s| s.sequence);
    let total_duration_ms = segments.iter().map(|s| s.duration_ms).sum();
    let format = segments.first().map(|s| s.format.clone());
    MediaTrack {
        track_type,
        segments,
        total_duration_ms,
        format,
    }
}

/// Video segments carry no per-frame duration; the track's total duration
/// is the span between the first and last frame.
fn finish_video_track(mut segments: Vec<MediaSegment>) -> MediaTrack {
    segments.sort_by_key(|s| s.sequence);
    let total_duration_ms = match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => (last.start_time_ms - first.start_time_ms).max(0) as u64,
        _ => 0,
    };
    let format = segments.first().map(|s| s.format.clone());
    MediaTrack {
        track_type: TrackType::Video,
        segments,
        total_duration_ms,
        format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscore_types::event::{AudioFormat, MessagePayload};
    use obscore_types::BinaryPayload;

    fn audio_event(offset_ms: i64, chunk_index: u64, duration_ms: u64) -> Event {
        Event::new(
            "audio.input",
            EventPayload::AudioInput(AudioPayload {
                payload: BinaryPayload::inline(vec![0u8; 4], "audio/pcm"),
                format: AudioFormat::default(),
                duration_ms,
                chunk_index,
                is_final: false,
            }),
        )
        .unwrap()
        .with_session_id("s1")
        .with_timestamp(chrono::DateTime::from_timestamp_millis(offset_ms).unwrap())
    }

    #[test]
    fn builds_audio_input_track_sorted_by_chunk_index() {
        let events = vec![
            audio_event(0, 1, 100),
            audio_event(100, 0, 100),
            Event::new(
                "message.created",
                EventPayload::MessageCreated(MessagePayload {
                    role: "user".into(),
                    content: "hi".into(),
                    ..Default::default()
                }),
            )
            .unwrap()
            .with_session_id("s1")
            .with_timestamp(chrono::DateTime::from_timestamp_millis(200).unwrap()),
        ];

        let timeline = MediaTimeline::build("s1", &events);
        assert_eq!(timeline.audio_input.segments.len(), 2);
        assert_eq!(timeline.audio_input.segments[0].sequence, 0);
        assert_eq!(timeline.audio_input.segments[1].sequence, 1);
        assert_eq!(timeline.audio_input.total_duration_ms, 200);
        assert!(timeline.audio_output.is_empty());
    }

    #[test]
    fn empty_events_yield_empty_tracks() {
        let timeline = MediaTimeline::build("s1", &[]);
        assert!(timeline.audio_input.is_empty());
        assert!(timeline.audio_output.is_empty());
        assert!(timeline.video.is_empty());
        assert_eq!(timeline.total_duration_ms(), 0);
    }
}
