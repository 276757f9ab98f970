//! Core domain types shared by the obscore event bus, event store, blob
//! store and session-replay engines.
//!
//! This crate has no I/O and no async runtime dependency: it is pure data
//! modeling.

pub mod annotation;
pub mod binary;
pub mod error;
pub mod event;
pub mod media;
pub mod session;
pub mod stored;

pub use annotation::{Annotation, AnnotationKind, AnnotationTarget};
pub use binary::BinaryPayload;
pub use error::{Error, Result};
pub use event::{Event, EventPayload};
pub use media::{MediaSegment, MediaTrack, TrackFormat, TrackType};
pub use session::SessionExtent;
pub use stored::{StoredEvent, StoredEventBody};
