//! `TestWorld`: a fluent builder wiring a temp-dir-backed
//! `EventStore`/`BlobStore`/`EventBus` triple for integration tests that
//! exercise more than one engine at once.

use std::sync::Arc;

use obscore_blob::BlobStore;
use obscore_bus::{BusConfig, EventBus};
use obscore_store::EventStore;
use tempfile::TempDir;

/// An isolated, temp-dir-backed instance of the three storage/dispatch
/// engines (event store, blob store, event bus), wired together the way a
/// real deployment would via `obscore-sdk::Client`.
pub struct TestWorld {
    _temp_dir: TempDir,
    event_store: Arc<EventStore>,
    blob_store: BlobStore,
    bus: EventBus,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Build a world with default bus tuning (10 workers, buffer 1000) and
    /// the bus wired to persist through the event store.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestWorldBuilder {
        TestWorldBuilder::default()
    }

    pub fn event_store(&self) -> Arc<EventStore> {
        self.event_store.clone()
    }

    pub fn blob_store(&self) -> BlobStore {
        self.blob_store.clone()
    }

    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }
}

/// Builder for [`TestWorld`], mirroring the knobs a caller would configure
/// through `obscore_sdk::Config`.
#[derive(Default)]
pub struct TestWorldBuilder {
    bus_config: Option<BusConfig>,
    attach_store_to_bus: bool,
}

impl TestWorldBuilder {
    pub fn with_bus_config(mut self, config: BusConfig) -> Self {
        self.bus_config = Some(config);
        self
    }

    /// Attach the event store to the bus so published events with a
    /// `session_id` are persisted before dispatch.
    pub fn with_persistence(mut self) -> Self {
        self.attach_store_to_bus = true;
        self
    }

    pub fn build(self) -> TestWorld {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let event_store = Arc::new(EventStore::new(temp_dir.path().join("events")));
        let blob_store = BlobStore::new(temp_dir.path().join("blobs"));

        let mut bus = EventBus::new(self.bus_config.unwrap_or_default());
        if self.attach_store_to_bus {
            bus = bus.with_store(event_store.clone());
        }

        TestWorld {
            _temp_dir: temp_dir,
            event_store,
            blob_store,
            bus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::message_event;
    use obscore_store::EventFilter;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn wires_store_blob_and_bus_in_one_temp_dir() {
        let world = TestWorld::builder().with_persistence().build();
        let cancel = CancellationToken::new();

        let event = message_event("s1", "user", "hi", 0);
        assert!(world.bus().publish(event).await);
        world.event_store().sync().await.unwrap();

        let events = world
            .event_store()
            .query(&cancel, &EventFilter::for_session("s1"))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);

        let stored = world
            .blob_store()
            .store(&cancel, "s1", b"hello", "text/plain")
            .await
            .unwrap();
        assert!(stored.reference.starts_with("file://"));
    }
}
