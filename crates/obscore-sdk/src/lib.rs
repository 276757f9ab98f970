//! Public facade over the obscore event bus, event store, blob store and
//! session-replay engines.
//!
//! Hides the internal crate seams behind a single `Client`, resolves a
//! workspace data directory the way a real deployment would (explicit path,
//! environment variable, XDG data dir, `~/.obscore` fallback), and
//! aggregates each internal crate's `Error` behind one facade `Error` with
//! `From` conversions.

mod client;
mod config;
mod error;
mod watch;

pub use client::{Client, SessionHandle};
pub use config::Config;
pub use error::{Error, Result};
pub use watch::WatchBuilder;

pub mod types {
    //! Re-exports of the domain types callers need to construct events,
    //! filters and players without depending on the internal crates
    //! directly.
    pub use obscore_store::EventFilter;
    pub use obscore_types::{
        Annotation, AnnotationKind, AnnotationTarget, BinaryPayload, Event, EventPayload,
        MediaSegment, MediaTrack, StoredEvent, TrackFormat, TrackType,
    };
    pub use obscore_timeline::{
        AnnotatedSession, AnnotationSource, Continuation, MediaTimeline, NoAnnotations,
        PlayerConfig, PlayerState, SessionMetadata, SessionPlayer, SyncPlayer, SyncPlayerConfig,
        TimelineEntry,
    };
}
