//! Media timeline construction and session replay: typed/seekable media
//! tracks, linear and synchronized players, and the annotated-session
//! loader with aggregate metadata.

mod annotated;
mod annotation_source;
mod error;
mod player;
mod reader;
mod sync_player;
mod timeline_view;
mod track;
mod wav;

pub use annotated::{AnnotatedSession, AnnotatedSessionLoader, SessionMetadata};
pub use annotation_source::{AnnotationSource, NoAnnotations};
pub use error::{Error, Result};
pub use player::{Continuation, PlayerConfig, PlayerState, SessionPlayer};
pub use reader::{MixedAudioReader, TrackReader};
pub use sync_player::{SyncPlayer, SyncPlayerConfig};
pub use timeline_view::{timeline_view, TimelineEntry};
pub use track::MediaTimeline;
pub use wav::export_wav;
