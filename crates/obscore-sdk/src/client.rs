use std::sync::Arc;

use obscore_blob::BlobStore;
use obscore_bus::{BusConfig, EventBus};
use obscore_store::{EventFilter, EventStore};
use obscore_timeline::{
    AnnotatedSession, AnnotatedSessionLoader, AnnotationSource, MediaTimeline, NoAnnotations,
};
use obscore_types::{Event, StoredEvent};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::watch::WatchBuilder;

/// Facade composing the event bus, event store, blob store and the
/// annotated-session loader behind a single handle.
///
/// Cloning a `Client` is cheap: every field is itself a cheap-clone handle
/// (`Arc`/`EventBus`/`BlobStore`), so clones observe the same underlying
/// storage and dispatch state.
#[derive(Clone)]
pub struct Client {
    event_store: Arc<EventStore>,
    blob_store: BlobStore,
    bus: EventBus,
    default_player_speed: f64,
}

impl Client {
    /// Open a client rooted at the directories named in `config`, wiring
    /// the bus to persist through the event store.
    pub fn open(config: Config) -> Result<Self> {
        let config = config.normalized()?;
        let event_store = Arc::new(EventStore::new(config.event_store_root));
        let blob_store = BlobStore::new(config.blob_store_root);
        let bus = EventBus::new(BusConfig {
            worker_pool_size: config.bus_worker_pool_size,
            event_buffer_size: config.bus_event_buffer_size,
        })
        .with_store(event_store.clone());

        Ok(Self {
            event_store,
            blob_store,
            bus,
            default_player_speed: config.default_player_speed,
        })
    }

    /// Open a client at the default workspace location, reading
    /// `obscore.toml` if present.
    pub fn connect_default() -> Result<Self> {
        Self::open(Config::load(None)?)
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

    pub fn default_player_speed(&self) -> f64 {
        self.default_player_speed
    }

    /// Publish an event through the bus (persisting it first if it carries
    /// a `session_id`). Returns whether it was accepted.
    pub async fn publish(&self, event: Event) -> bool {
        self.bus.publish(event).await
    }

    /// Query one session's events directly against the event store,
    /// bypassing the bus.
    pub async fn query(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>> {
        let cancel = CancellationToken::new();
        Ok(self.event_store.query(&cancel, filter).await?)
    }

    pub fn session(&self, session_id: impl Into<String>) -> SessionHandle {
        SessionHandle {
            client: self.clone(),
            session_id: session_id.into(),
        }
    }

    /// Start a real-time subscription, bridging `EventBus::subscribe_all`
    /// or `subscribe` into a `futures::Stream`.
    pub fn watch(&self) -> WatchBuilder {
        WatchBuilder::new(self.bus.clone())
    }
}

/// A handle scoped to one session, bundling its event store, blob store
/// and an optional annotation source for loading an [`AnnotatedSession`].
pub struct SessionHandle {
    client: Client,
    session_id: String,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Load this session's events, typed where the discriminator is
    /// recognized.
    pub async fn events(&self) -> Result<Vec<Event>> {
        let stored = self
            .client
            .query(&EventFilter::for_session(&self.session_id))
            .await?;
        stored
            .iter()
            .map(|s| s.to_event().map_err(obscore_timeline::Error::Types))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Build this session's media timeline directly from its events,
    /// without annotations or metadata (a thin path for players that
    /// don't need the full `AnnotatedSession`).
    pub async fn timeline(&self) -> Result<MediaTimeline> {
        let events = self.events().await?;
        Ok(MediaTimeline::build(&self.session_id, &events))
    }

    /// Load the full annotated session (events + annotations + timeline +
    /// metadata) using `annotation_source`, or `NoAnnotations` if omitted.
    pub async fn load_annotated(
        &self,
        annotation_source: Option<Arc<dyn AnnotationSource>>,
    ) -> Result<AnnotatedSession> {
        let loader = AnnotatedSessionLoader::new(
            self.client.event_store(),
            annotation_source.unwrap_or_else(|| Arc::new(NoAnnotations)),
        )
        .with_blob_store(self.client.blob_store());

        Ok(loader.load(self.session_id.clone()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscore_testing::fixtures::message_event;

    fn test_config(root: &std::path::Path) -> Config {
        Config {
            event_store_root: root.join("events"),
            blob_store_root: root.join("blobs"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn publish_then_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let client = Client::open(test_config(dir.path())).unwrap();

        let event = message_event("s1", "user", "hello", 0);
        assert!(client.publish(event).await);
        client.event_store().sync().await.unwrap();

        let events = client.session("s1").events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn load_annotated_without_annotation_source_uses_no_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let client = Client::open(test_config(dir.path())).unwrap();
        client
            .publish(message_event("s1", "user", "hi", 0))
            .await;
        client.event_store().sync().await.unwrap();

        let session = client.session("s1").load_annotated(None).await.unwrap();
        assert_eq!(session.events.len(), 1);
        assert!(session.annotations.is_empty());
        assert!(session.metadata.is_some());
    }
}
