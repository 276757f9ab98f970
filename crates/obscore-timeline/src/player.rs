use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use obscore_types::Event;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};

/// Linear player state machine. Initial and terminal state is `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
}

/// What an `on_event` callback returns to request the loop stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    Stop,
}

pub struct PlayerConfig {
    pub speed: f64,
    pub skip_timing: bool,
    pub on_event: Arc<dyn Fn(&Event, ChronoDuration) -> Continuation + Send + Sync>,
    pub on_state_change: Option<Arc<dyn Fn(PlayerState) + Send + Sync>>,
    pub on_complete: Option<Arc<dyn Fn() + Send + Sync>>,
    pub on_error: Option<Arc<dyn Fn(&Error) + Send + Sync>>,
}

impl PlayerConfig {
    pub fn new<F>(on_event: F) -> Self
    where
        F: Fn(&Event, ChronoDuration) -> Continuation + Send + Sync + 'static,
    {
        Self {
            speed: 1.0,
            skip_timing: false,
            on_event: Arc::new(on_event),
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
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

struct Inner {
    events: Vec<Event>,
    state: Mutex<PlayerState>,
    position: AtomicUsize,
    speed: Mutex<f64>,
    start_time: Mutex<Instant>,
    pause_time: Mutex<Option<Instant>>,
    cancel: Mutex<Option<CancellationToken>>,
    reschedule: Notify,
    config: PlayerConfig,
}

/// Timed replay of a session's events to a single callback, with
/// pause/resume/stop/seek and adjustable speed.
///
/// Cloning a `SessionPlayer` shares the same playback task and state —
/// clones are handles, not independent players.
#[derive(Clone)]
pub struct SessionPlayer(Arc<Inner>);

impl SessionPlayer {
    pub fn new(events: Vec<Event>, config: PlayerConfig) -> Result<Self> {
        if config.speed <= 0.0 {
            return Err(Error::InvalidArgument("player speed must be positive".to_string()));
        }
        Ok(Self(Arc::new(Inner {
            events,
            state: Mutex::new(PlayerState::Stopped),
            position: AtomicUsize::new(0),
            speed: Mutex::new(config.speed),
            start_time: Mutex::new(Instant::now()),
            pause_time: Mutex::new(None),
            cancel: Mutex::new(None),
            reschedule: Notify::new(),
            config,
        })))
    }

    pub fn state(&self) -> PlayerState {
        *self.0.state.lock().expect("player state poisoned")
    }

    /// Start (or resume) playback. No-op if already playing.
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
            *self.0.start_time.lock().expect("start_time poisoned") = self.anchor_for_current_position();
        }

        let cancel = CancellationToken::new();
        *self.0.cancel.lock().expect("cancel poisoned") = Some(cancel.clone());

        let inner = self.0.clone();
        tokio::spawn(async move {
            run_loop(inner, cancel).await;
        });
    }

    /// Pause playback, preserving position. No-op unless currently playing.
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

    /// Stop playback and reset position to the beginning. Idempotent.
    pub fn stop(&self) {
        let mut state = self.0.state.lock().expect("player state poisoned");
        if *state == PlayerState::Stopped {
            return;
        }
        *state = PlayerState::Stopped;
        drop(state);
        self.0.position.store(0, Ordering::SeqCst);
        *self.0.pause_time.lock().expect("pause_time poisoned") = None;
        self.cancel_loop();
        self.notify_state(PlayerState::Stopped);
    }

    /// Seek to `offset` from session start, clamped to the event range.
    /// If currently playing, the running loop is nudged to recompute its
    /// wait against the new position without being treated as a stop.
    pub fn seek(&self, offset: ChronoDuration) {
        let Some(first_ts) = self.0.events.first().map(|e| e.timestamp) else {
            return;
        };
        let target_ts = first_ts + offset;
        let idx = self.0.events.partition_point(|e| e.timestamp < target_ts);
        self.0.position.store(idx, Ordering::SeqCst);

        if self.state() == PlayerState::Playing {
            let speed = *self.0.speed.lock().expect("speed poisoned");
            let anchor = Instant::now() - scale(offset, speed);
            *self.0.start_time.lock().expect("start_time poisoned") = anchor;
            self.0.reschedule.notify_one();
        }
    }

    /// Change playback speed, preserving the current position's wall-clock
    /// schedule by correcting `start_time`.
    pub fn set_speed(&self, new_speed: f64) -> Result<()> {
        if new_speed <= 0.0 {
            return Err(Error::InvalidArgument("player speed must be positive".to_string()));
        }
        let mut speed = self.0.speed.lock().expect("speed poisoned");
        let old_speed = *speed;
        if (old_speed - new_speed).abs() < f64::EPSILON {
            return Ok(());
        }

        if self.state() == PlayerState::Playing {
            let position_ms = self.current_event_offset_ms();
            let delta_ms = position_ms / old_speed - position_ms / new_speed;
            let mut start = self.0.start_time.lock().expect("start_time poisoned");
            *start = shift_instant(*start, delta_ms);
        }
        *speed = new_speed;
        drop(speed);
        self.0.reschedule.notify_one();
        Ok(())
    }

    fn current_event_offset_ms(&self) -> f64 {
        let idx = self
            .0
            .position
            .load(Ordering::SeqCst)
            .min(self.0.events.len().saturating_sub(1));
        let Some(first) = self.0.events.first() else {
            return 0.0;
        };
        self.0
            .events
            .get(idx)
            .map(|e| (e.timestamp - first.timestamp).num_milliseconds() as f64)
            .unwrap_or(0.0)
    }

    fn anchor_for_current_position(&self) -> Instant {
        let offset_ms = self.current_event_offset_ms();
        let speed = *self.0.speed.lock().expect("speed poisoned");
        Instant::now() - scale(ChronoDuration::milliseconds(offset_ms as i64), speed)
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

fn scale(offset: ChronoDuration, speed: f64) -> Duration {
    let ms = (offset.num_milliseconds().max(0) as f64) / speed;
    Duration::from_secs_f64((ms / 1000.0).max(0.0))
}

fn shift_instant(instant: Instant, delta_ms: f64) -> Instant {
    if delta_ms >= 0.0 {
        instant + Duration::from_secs_f64(delta_ms / 1000.0)
    } else {
        instant - Duration::from_secs_f64((-delta_ms) / 1000.0)
    }
}

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        let idx = inner.position.load(Ordering::SeqCst);
        if idx >= inner.events.len() {
            complete(&inner);
            return;
        }
        let first_ts = inner.events[0].timestamp;
        let event = &inner.events[idx];
        let event_offset = event.timestamp - first_ts;

        if !inner.config.skip_timing && event_offset > ChronoDuration::zero() {
            let speed = *inner.speed.lock().expect("speed poisoned");
            let start_time = *inner.start_time.lock().expect("start_time poisoned");
            let target = start_time + scale(event_offset, speed);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = inner.reschedule.notified() => continue,
                _ = tokio::time::sleep_until(target) => {}
            }
        } else if cancel.is_cancelled() {
            return;
        }

        let outcome = (inner.config.on_event)(event, event_offset);

        // Advance only if the position hasn't moved since we read it —
        // a concurrent `Seek` wins over this loop's own advance.
        let _ = inner.position.compare_exchange(idx, idx + 1, Ordering::SeqCst, Ordering::SeqCst);

        if outcome == Continuation::Stop {
            *inner.state.lock().expect("player state poisoned") = PlayerState::Stopped;
            inner.position.store(0, Ordering::SeqCst);
            if let Some(cb) = &inner.config.on_state_change {
                cb(PlayerState::Stopped);
            }
            return;
        }
    }
}

fn complete(inner: &Inner) {
    *inner.state.lock().expect("player state poisoned") = PlayerState::Stopped;
    inner.position.store(0, Ordering::SeqCst);
    info!("session player reached end of events");
    if let Some(cb) = &inner.config.on_complete {
        cb();
    }
    if let Some(cb) = &inner.config.on_state_change {
        cb(PlayerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscore_types::event::{EventPayload, MessagePayload};
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration as StdDuration;

    fn message_event(ms: i64, text: &str) -> Event {
        Event::new(
            "message.created",
            EventPayload::MessageCreated(MessagePayload {
                role: "user".into(),
                content: text.into(),
                ..Default::default()
            }),
        )
        .unwrap()
        .with_session_id("s1")
        .with_timestamp(chrono::DateTime::from_timestamp_millis(ms).unwrap())
    }

    #[tokio::test]
    async fn delivers_events_in_order_with_skip_timing() {
        let events = vec![message_event(0, "a"), message_event(50, "b"), message_event(100, "c")];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();

        let config = PlayerConfig::new(move |event, _offset| {
            if let EventPayload::MessageCreated(p) = &event.data {
                seen2.lock().unwrap().push(p.content.clone());
            }
            Continuation::Continue
        })
        .with_skip_timing(true);

        let player = SessionPlayer::new(events, config).unwrap();
        player.play();

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn stop_resets_position_and_is_idempotent() {
        let events = vec![message_event(0, "a"), message_event(1000, "b")];
        let config = PlayerConfig::new(|_e, _o| Continuation::Continue);
        let player = SessionPlayer::new(events, config).unwrap();

        player.play();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        player.stop();
        player.stop();

        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn rejects_non_positive_speed() {
        let config = PlayerConfig::new(|_e, _o| Continuation::Continue).with_speed(0.0);
        let err = SessionPlayer::new(vec![message_event(0, "a")], config).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn on_event_stop_halts_delivery() {
        let events = vec![message_event(0, "a"), message_event(0, "b"), message_event(0, "c")];
        let delivered = Arc::new(Counter::new(0));
        let delivered2 = delivered.clone();

        let config = PlayerConfig::new(move |_e, _o| {
            let n = delivered2.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Continuation::Stop
            } else {
                Continuation::Continue
            }
        })
        .with_skip_timing(true);

        let player = SessionPlayer::new(events, config).unwrap();
        player.play();
        tokio::time::sleep(StdDuration::from_millis(20)).await;

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(player.state(), PlayerState::Stopped);
    }
}
