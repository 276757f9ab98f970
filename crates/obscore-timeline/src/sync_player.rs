use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use obscore_blob::BlobStore;
use obscore_types::{Annotation, Event, StoredEvent, TrackType};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Result;
use crate::player::{Continuation, PlayerState};
use crate::reader::TrackReader;
use crate::track::MediaTimeline;

const DEFAULT_AUDIO_BUFFER_SIZE: usize = 4096;
const TICK_INTERVAL: StdDuration = StdDuration::from_millis(20);

pub struct SyncPlayerConfig {
    pub speed: f64,
    pub skip_timing: bool,
    pub audio_buffer_size: usize,
    pub on_event: Arc<dyn Fn(&Event, i64) -> Continuation + Send + Sync>,
    pub on_audio: Arc<dyn Fn(&[u8], TrackType, i64) -> Continuation + Send + Sync>,
    pub on_annotation: Arc<dyn Fn(&Annotation, i64) -> Continuation + Send + Sync>,
    pub on_state_change: Option<Arc<dyn Fn(PlayerState) + Send + Sync>>,
    pub on_complete: Option<Arc<dyn Fn() + Send + Sync>>,
    pub on_error: Option<Arc<dyn Fn(&crate::error::Error) + Send + Sync>>,
}

impl SyncPlayerConfig {
    pub fn new<E, A, N>(on_event: E, on_audio: A, on_annotation: N) -> Self
    where
        E: Fn(&Event, i64) -> Continuation + Send + Sync + 'static,
        A: Fn(&[u8], TrackType, i64) -> Continuation + Send + Sync + 'static,
        N: Fn(&Annotation, i64) -> Continuation + Send + Sync + 'static,
    {
        Self {
            speed: 1.0,
            skip_timing: false,
            audio_buffer_size: DEFAULT_AUDIO_BUFFER_SIZE,
            on_event: Arc::new(on_event),
            on_audio: Arc::new(on_audio),
            on_annotation: Arc::new(on_annotation),
            on_state_change: None,
            on_complete: None,
            on_error: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_skip_timing(mut self, skip_timing: bool) -> Self {
        self.skip_timing = skip_timing;
        self
    }

    pub fn with_audio_buffer_size(mut self, size: usize) -> Self {
        self.audio_buffer_size = if size == 0 { DEFAULT_AUDIO_BUFFER_SIZE } else { size };
        self
    }

    pub fn with_on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(PlayerState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(f));
        self
    }

    pub fn with_on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(f));
        self
    }

    pub fn with_on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&crate::error::Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

struct AnnotationEntry {
    effective_ms: i64,
    annotation: Annotation,
}

struct Inner {
    events: Vec<Event>,
    annotations: Vec<AnnotationEntry>,
    timeline: MediaTimeline,
    blob_store: Option<BlobStore>,
    duration_ms: i64,
    flush_position_ms: i64,
    state: Mutex<PlayerState>,
    next_event: AtomicUsize,
    next_annotation: AtomicUsize,
    speed: Mutex<f64>,
    start_time: Mutex<Instant>,
    pause_time: Mutex<Option<Instant>>,
    cancel: Mutex<Option<CancellationToken>>,
    input_reader: Mutex<Option<TrackReader>>,
    output_reader: Mutex<Option<TrackReader>>,
    last_position_ms: AtomicI64,
    config: SyncPlayerConfig,
}

/// Timed co-delivery of events, annotations, and audio bytes driven by a
/// fixed-interval ticker.
#[derive(Clone)]
pub struct SyncPlayer(Arc<Inner>);

impl SyncPlayer {
    /// `stored_events` must be sorted by timestamp (as returned by
    /// `EventStore::query`) and carries the sequence numbers needed to
    /// resolve `AnnotationTarget::Event` annotations against their event's
    /// timestamp.
    pub fn new(
        stored_events: Vec<StoredEvent>,
        annotations: Vec<Annotation>,
        timeline: MediaTimeline,
        blob_store: Option<BlobStore>,
        config: SyncPlayerConfig,
    ) -> Result<Self> {
        if config.speed <= 0.0 {
            return Err(crate::error::Error::InvalidArgument(
                "player speed must be positive".to_string(),
            ));
        }

        let first_ts = stored_events.first().map(|s| s.event.timestamp);
        let events = stored_events
            .iter()
            .map(|s| s.to_event())
            .collect::<std::result::Result<Vec<Event>, _>>()?;

        let mut annotation_entries: Vec<AnnotationEntry> = annotations
            .into_iter()
            .map(|annotation| {
                let event_ts_ms = match &annotation.target {
                    obscore_types::AnnotationTarget::Event { sequence } => stored_events
                        .iter()
                        .find(|s| s.seq == *sequence)
                        .zip(first_ts)
                        .map(|(s, first)| (s.event.timestamp - first).num_milliseconds()),
                    _ => None,
                };
                let effective_ms = annotation.effective_time_ms(event_ts_ms);
                AnnotationEntry { effective_ms, annotation }
            })
            .collect();
        annotation_entries.sort_by_key(|a| a.effective_ms);

        let duration_ms = timeline.total_duration_ms() as i64;
        let last_event_offset_ms = match (first_ts, events.last()) {
            (Some(first), Some(last)) => (last.timestamp - first).num_milliseconds(),
            _ => 0,
        };
        // §4.6's "flush everything immediately in a single synchronous
        // pass" covers events, not just media: a session with events but
        // empty tracks (duration_ms == 0) must still flush every event,
        // not just the ones at offset zero.
        let flush_position_ms = duration_ms.max(last_event_offset_ms);

        Ok(Self(Arc::new(Inner {
            events,
            annotations: annotation_entries,
            timeline,
            blob_store,
            duration_ms,
            flush_position_ms,
            state: Mutex::new(PlayerState::Stopped),
            next_event: AtomicUsize::new(0),
            next_annotation: AtomicUsize::new(0),
            speed: Mutex::new(config.speed),
            start_time: Mutex::new(Instant::now()),
            pause_time: Mutex::new(None),
            cancel: Mutex::new(None),
            input_reader: Mutex::new(None),
            output_reader: Mutex::new(None),
            last_position_ms: AtomicI64::new(0),
            config,
        })))
    }

    pub fn state(&self) -> PlayerState {
        *self.0.state.lock().expect("player state poisoned")
    }

    pub fn play(&self) {
        let mut state = self.0.state.lock().expect("player state poisoned");
        if *state == PlayerState::Playing {
            return;
        }
        let resuming = *state == PlayerState::Paused;
        *state = PlayerState::Playing;
        drop(state);
        self.notify_state(PlayerState::Playing);

        if resuming {
            if let Some(paused_at) = self.0.pause_time.lock().expect("pause_time poisoned").take() {
                let mut start = self.0.start_time.lock().expect("start_time poisoned");
                *start = *start + paused_at.elapsed();
            }
        } else {
            let position_ms = self.0.last_position_ms.load(Ordering::SeqCst);
            let speed = *self.0.speed.lock().expect("speed poisoned");
            *self.0.start_time.lock().expect("start_time poisoned") =
                Instant::now() - scale_ms(position_ms, speed);
            self.open_readers();
        }

        let cancel = CancellationToken::new();
        *self.0.cancel.lock().expect("cancel poisoned") = Some(cancel.clone());

        let inner = self.0.clone();
        tokio::spawn(async move {
            run_loop(inner, cancel).await;
        });
    }

    pub fn pause(&self) {
        let mut state = self.0.state.lock().expect("player state poisoned");
        if *state != PlayerState::Playing {
            return;
        }
        *state = PlayerState::Paused;
        drop(state);
        *self.0.pause_time.lock().expect("pause_time poisoned") = Some(Instant::now());
        self.cancel_loop();
        self.notify_state(PlayerState::Paused);
    }

    /// Cancels playback, resets position/indices to zero, and closes every
    /// open track reader. Idempotent.
    pub fn stop(&self) {
        let mut state = self.0.state.lock().expect("player state poisoned");
        if *state == PlayerState::Stopped {
            return;
        }
        *state = PlayerState::Stopped;
        drop(state);
        self.reset_progress();
        self.close_readers();
        self.cancel_loop();
        self.notify_state(PlayerState::Stopped);
    }

    /// Seek to `position_ms` from session start, clamped to `[0, duration]`.
    pub fn seek(&self, position_ms: i64) {
        let position_ms = position_ms.clamp(0, self.0.duration_ms);
        self.0.last_position_ms.store(position_ms, Ordering::SeqCst);

        let first_ts = self.0.events.first().map(|e| e.timestamp);
        let next_event = if let Some(first_ts) = first_ts {
            self.0
                .events
                .iter()
                .position(|e| (e.timestamp - first_ts).num_milliseconds() > position_ms)
                .unwrap_or(self.0.events.len())
        } else {
            0
        };
        self.0.next_event.store(next_event, Ordering::SeqCst);

        let next_annotation = self
            .0
            .annotations
            .iter()
            .position(|a| a.effective_ms > position_ms)
            .unwrap_or(self.0.annotations.len());
        self.0.next_annotation.store(next_annotation, Ordering::SeqCst);

        if let Some(reader) = self.0.input_reader.lock().expect("input reader poisoned").as_mut() {
            reader.seek(position_ms.max(0) as u64);
        }
        if let Some(reader) = self.0.output_reader.lock().expect("output reader poisoned").as_mut() {
            reader.seek(position_ms.max(0) as u64);
        }

        if self.state() == PlayerState::Playing {
            let speed = *self.0.speed.lock().expect("speed poisoned");
            *self.0.start_time.lock().expect("start_time poisoned") =
                Instant::now() - scale_ms(position_ms, speed);
        }
    }

    pub fn set_speed(&self, new_speed: f64) -> Result<()> {
        if new_speed <= 0.0 {
            return Err(crate::error::Error::InvalidArgument(
                "player speed must be positive".to_string(),
            ));
        }
        let mut speed = self.0.speed.lock().expect("speed poisoned");
        let old_speed = *speed;
        if (old_speed - new_speed).abs() < f64::EPSILON {
            return Ok(());
        }
        if self.state() == PlayerState::Playing {
            let position_ms = self.0.last_position_ms.load(Ordering::SeqCst) as f64;
            let delta_ms = position_ms / old_speed - position_ms / new_speed;
            let mut start = self.0.start_time.lock().expect("start_time poisoned");
            *start = shift_instant(*start, delta_ms);
        }
        *speed = new_speed;
        Ok(())
    }

    fn open_readers(&self) {
        let timeline = &self.0.timeline;
        let mut input = self.0.input_reader.lock().expect("input reader poisoned");
        if !timeline.audio_input.is_empty() {
            *input = Some(TrackReader::new(timeline.audio_input.clone(), self.0.blob_store.clone()));
        }
        let mut output = self.0.output_reader.lock().expect("output reader poisoned");
        if !timeline.audio_output.is_empty() {
            *output = Some(TrackReader::new(timeline.audio_output.clone(), self.0.blob_store.clone()));
        }
    }

    fn close_readers(&self) {
        if let Some(reader) = self.0.input_reader.lock().expect("input reader poisoned").as_mut() {
            reader.close();
        }
        if let Some(reader) = self.0.output_reader.lock().expect("output reader poisoned").as_mut() {
            reader.close();
        }
        *self.0.input_reader.lock().expect("input reader poisoned") = None;
        *self.0.output_reader.lock().expect("output reader poisoned") = None;
    }

    fn reset_progress(&self) {
        self.0.next_event.store(0, Ordering::SeqCst);
        self.0.next_annotation.store(0, Ordering::SeqCst);
        self.0.last_position_ms.store(0, Ordering::SeqCst);
    }

    fn cancel_loop(&self) {
        if let Some(cancel) = self.0.cancel.lock().expect("cancel poisoned").take() {
            cancel.cancel();
        }
    }

    fn notify_state(&self, state: PlayerState) {
        if let Some(cb) = &self.0.config.on_state_change {
            cb(state);
        }
    }
}

fn scale_ms(ms: i64, speed: f64) -> StdDuration {
    StdDuration::from_secs_f64(((ms.max(0) as f64) / speed / 1000.0).max(0.0))
}

fn shift_instant(instant: Instant, delta_ms: f64) -> Instant {
    if delta_ms >= 0.0 {
        instant + StdDuration::from_secs_f64(delta_ms / 1000.0)
    } else {
        instant - StdDuration::from_secs_f64((-delta_ms) / 1000.0)
    }
}

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    if inner.config.skip_timing {
        tick(&inner).await;
        complete_if_done(&inner);
        return;
    }

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if !tick(&inner).await {
            return;
        }
        if complete_if_done(&inner) {
            return;
        }
    }
}

/// Run one tick's worth of delivery. Returns `false` if a callback asked to
/// stop mid-tick.
async fn tick(inner: &Arc<Inner>) -> bool {
    let speed = *inner.speed.lock().expect("speed poisoned");
    let start_time = *inner.start_time.lock().expect("start_time poisoned");
    let position_ms = if inner.config.skip_timing {
        inner.flush_position_ms
    } else {
        (start_time.elapsed().as_secs_f64() * 1000.0 * speed) as i64
    };
    inner.last_position_ms.store(position_ms, Ordering::SeqCst);

    let first_ts = inner.events.first().map(|e| e.timestamp);
    loop {
        let idx = inner.next_event.load(Ordering::SeqCst);
        let Some(event) = inner.events.get(idx) else { break };
        let offset_ms = match first_ts {
            Some(ts) => (event.timestamp - ts).num_milliseconds(),
            None => 0,
        };
        if offset_ms > position_ms {
            break;
        }
        let outcome = (inner.config.on_event)(event, offset_ms);
        inner.next_event.store(idx + 1, Ordering::SeqCst);
        if outcome == Continuation::Stop {
            stop_from_loop(inner);
            return false;
        }
    }

    loop {
        let idx = inner.next_annotation.load(Ordering::SeqCst);
        let Some(entry) = inner.annotations.get(idx) else { break };
        if entry.effective_ms > position_ms {
            break;
        }
        let outcome = (inner.config.on_annotation)(&entry.annotation, entry.effective_ms);
        inner.next_annotation.store(idx + 1, Ordering::SeqCst);
        if outcome == Continuation::Stop {
            stop_from_loop(inner);
            return false;
        }
    }

    let mut buf = vec![0u8; inner.config.audio_buffer_size];
    if let Some(reader) = inner.input_reader.lock().expect("input reader poisoned").as_mut() {
        match reader.read(&mut buf).await {
            Ok(n) if n > 0 => {
                let outcome = (inner.config.on_audio)(&buf[..n], TrackType::AudioInput, position_ms);
                if outcome == Continuation::Stop {
                    stop_from_loop(inner);
                    return false;
                }
            }
            Ok(_) => {}
            Err(e) => report_error(inner, e),
        }
    }
    if let Some(reader) = inner.output_reader.lock().expect("output reader poisoned").as_mut() {
        match reader.read(&mut buf).await {
            Ok(n) if n > 0 => {
                let outcome = (inner.config.on_audio)(&buf[..n], TrackType::AudioOutput, position_ms);
                if outcome == Continuation::Stop {
                    stop_from_loop(inner);
                    return false;
                }
            }
            Ok(_) => {}
            Err(e) => report_error(inner, e),
        }
    }

    true
}

fn report_error(inner: &Arc<Inner>, error: crate::error::Error) {
    tracing::warn!(error = %error, "synchronized player track reader failed mid-tick");
    if let Some(cb) = &inner.config.on_error {
        cb(&error);
    }
}

fn complete_if_done(inner: &Arc<Inner>) -> bool {
    let position_ms = inner.last_position_ms.load(Ordering::SeqCst);
    if position_ms < inner.duration_ms {
        return false;
    }
    *inner.state.lock().expect("player state poisoned") = PlayerState::Stopped;
    info!("synchronized player reached end of timeline");
    if let Some(cb) = &inner.config.on_complete {
        cb();
    }
    if let Some(cb) = &inner.config.on_state_change {
        cb(PlayerState::Stopped);
    }
    true
}

fn stop_from_loop(inner: &Inner) {
    *inner.state.lock().expect("player state poisoned") = PlayerState::Stopped;
    inner.next_event.store(0, Ordering::SeqCst);
    inner.next_annotation.store(0, Ordering::SeqCst);
    inner.last_position_ms.store(0, Ordering::SeqCst);
    if let Some(cb) = &inner.config.on_state_change {
        cb(PlayerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscore_types::event::{AudioFormat, AudioPayload, MessagePayload};
    use obscore_types::{AnnotationTarget, BinaryPayload, Event as CoreEvent, StoredEvent};
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration as StdDuration;

    fn message_event(session: &str, ms: i64, text: &str) -> CoreEvent {
        CoreEvent::new(
            "message.created",
            obscore_types::EventPayload::MessageCreated(MessagePayload {
                role: "user".into(),
                content: text.into(),
                ..Default::default()
            }),
        )
        .unwrap()
        .with_session_id(session)
        .with_timestamp(chrono::DateTime::from_timestamp_millis(ms).unwrap())
    }

    fn audio_event(session: &str, ms: i64, chunk_index: u64, duration_ms: u64) -> CoreEvent {
        CoreEvent::new(
            "audio.input",
            obscore_types::EventPayload::AudioInput(AudioPayload {
                payload: BinaryPayload::inline(vec![9u8; 4], "audio/pcm"),
                format: AudioFormat::default(),
                duration_ms,
                chunk_index,
                is_final: false,
            }),
        )
        .unwrap()
        .with_session_id(session)
        .with_timestamp(chrono::DateTime::from_timestamp_millis(ms).unwrap())
    }

    fn stored(seq: u64, event: &CoreEvent) -> StoredEvent {
        StoredEvent::from_event(seq, None, event).unwrap()
    }

    fn no_op_config() -> SyncPlayerConfig {
        SyncPlayerConfig::new(
            |_e, _o| Continuation::Continue,
            |_bytes, _track, _pos| Continuation::Continue,
            |_a, _o| Continuation::Continue,
        )
    }

    #[tokio::test]
    async fn skip_timing_delivers_everything_in_one_pass() {
        let events = vec![
            message_event("s1", 0, "a"),
            audio_event("s1", 0, 0, 50),
            message_event("s1", 50, "b"),
        ];
        let stored_events: Vec<StoredEvent> = events.iter().enumerate().map(|(i, e)| stored(i as u64 + 1, e)).collect();
        let timeline = MediaTimeline::build("s1", &events);

        let seen_events = Arc::new(Mutex::new(Vec::new()));
        let seen_events2 = seen_events.clone();
        let seen_audio = Arc::new(Counter::new(0));
        let seen_audio2 = seen_audio.clone();

        let config = SyncPlayerConfig::new(
            move |e, _o| {
                seen_events2.lock().unwrap().push(e.event_type.clone());
                Continuation::Continue
            },
            move |_bytes, _track, _pos| {
                seen_audio2.fetch_add(1, Ordering::SeqCst);
                Continuation::Continue
            },
            |_a, _o| Continuation::Continue,
        )
        .with_skip_timing(true);

        let player = SyncPlayer::new(stored_events, Vec::new(), timeline, None, config).unwrap();
        player.play();
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        assert_eq!(seen_events.lock().unwrap().len(), 3);
        assert!(seen_audio.load(Ordering::SeqCst) >= 1);
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn annotations_delivered_in_time_order_alongside_events() {
        let events = vec![message_event("s1", 0, "a"), message_event("s1", 50, "b")];
        let stored_events: Vec<StoredEvent> = events.iter().enumerate().map(|(i, e)| stored(i as u64 + 1, e)).collect();
        let timeline = MediaTimeline::build("s1", &events);

        let annotations = vec![Annotation {
            session_id: "s1".into(),
            kind: obscore_types::AnnotationKind::Comment,
            key: "note".into(),
            value: serde_json::json!("looks good"),
            target: AnnotationTarget::TimeRange { start_ms: 10, end_ms: 20 },
        }];

        let seen_annotations = Arc::new(Counter::new(0));
        let seen_annotations2 = seen_annotations.clone();

        let config = SyncPlayerConfig::new(
            |_e, _o| Continuation::Continue,
            |_bytes, _track, _pos| Continuation::Continue,
            move |_a, _o| {
                seen_annotations2.fetch_add(1, Ordering::SeqCst);
                Continuation::Continue
            },
        )
        .with_skip_timing(true);

        let player = SyncPlayer::new(stored_events, annotations, timeline, None, config).unwrap();
        player.play();
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        assert_eq!(seen_annotations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_resets_indices_and_is_idempotent() {
        let events = vec![message_event("s1", 0, "a"), message_event("s1", 1000, "b")];
        let stored_events: Vec<StoredEvent> = events.iter().enumerate().map(|(i, e)| stored(i as u64 + 1, e)).collect();
        let timeline = MediaTimeline::build("s1", &events);

        let player = SyncPlayer::new(stored_events, Vec::new(), timeline, None, no_op_config()).unwrap();
        player.play();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        player.stop();
        player.stop();

        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn rejects_non_positive_speed() {
        let events = vec![message_event("s1", 0, "a")];
        let stored_events: Vec<StoredEvent> = events.iter().enumerate().map(|(i, e)| stored(i as u64 + 1, e)).collect();
        let timeline = MediaTimeline::build("s1", &events);

        let err = SyncPlayer::new(stored_events, Vec::new(), timeline, None, no_op_config().with_speed(0.0))
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn skip_timing_flushes_every_event_with_no_media_tracks() {
        // Empty tracks make `timeline.total_duration_ms() == 0`; the flush
        // pass must still reach the last event's offset rather than
        // stopping at position zero.
        let events = vec![
            message_event("s1", 0, "a"),
            message_event("s1", 50, "b"),
            message_event("s1", 100, "c"),
        ];
        let stored_events: Vec<StoredEvent> = events.iter().enumerate().map(|(i, e)| stored(i as u64 + 1, e)).collect();
        let timeline = MediaTimeline::build("s1", &events);
        assert_eq!(timeline.total_duration_ms(), 0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let config = SyncPlayerConfig::new(
            move |e, _o| {
                seen2.lock().unwrap().push(e.event_type.clone());
                Continuation::Continue
            },
            |_bytes, _track, _pos| Continuation::Continue,
            |_a, _o| Continuation::Continue,
        )
        .with_skip_timing(true);

        let player = SyncPlayer::new(stored_events, Vec::new(), timeline, None, config).unwrap();
        player.play();
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(player.state(), PlayerState::Stopped);
    }
}
