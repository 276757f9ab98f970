use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use obscore_bus::EventBus;
use obscore_types::Event;

/// Builder for a real-time subscription over the bus, bridged into a
/// `futures::Stream` over the bus's callback-based listener registration.
pub struct WatchBuilder {
    bus: EventBus,
    event_type: Option<String>,
}

impl WatchBuilder {
    pub(crate) fn new(bus: EventBus) -> Self {
        Self {
            bus,
            event_type: None,
        }
    }

    /// Restrict the stream to one event type instead of every published
    /// event.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Subscribe and start receiving events on the returned stream. The
    /// subscription is released when the stream is dropped.
    pub fn start(self) -> LiveStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let unsubscribe = match self.event_type {
            Some(event_type) => self.bus.subscribe(event_type, move |event: &Event| {
                let _ = tx.send(event.clone());
            }),
            None => self.bus.subscribe_all(move |event: &Event| {
                let _ = tx.send(event.clone());
            }),
        };

        LiveStream {
            receiver: rx,
            _unsubscribe: Some(unsubscribe),
        }
    }
}

/// A live stream of events delivered from the bus as they are published.
pub struct LiveStream {
    receiver: tokio::sync::mpsc::UnboundedReceiver<Event>,
    _unsubscribe: Option<obscore_bus::Unsubscribe>,
}

impl LiveStream {
    /// Poll for the next event without blocking. Returns `None` if no
    /// event is available right now (the stream may still produce more
    /// later).
    pub fn try_next(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for LiveStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
