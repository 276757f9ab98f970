use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Annotation type tag. Annotations are produced by an external subsystem
/// and consumed here only through the `AnnotationSource` contract defined
/// in `obscore-timeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Score,
    Label,
    Comment,
    Flag,
    Assertion,
}

/// What an annotation is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum AnnotationTarget {
    Session,
    Event { sequence: u64 },
    TimeRange { start_ms: i64, end_ms: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub session_id: String,
    pub kind: AnnotationKind,
    pub key: String,
    pub value: Value,
    pub target: AnnotationTarget,
}

impl Annotation {
    /// The time offset (ms from session start) used to order an annotation
    /// alongside events and segments in a unified timeline view: time-range
    /// annotations use their start, event-bound annotations use the
    /// targeted event's timestamp (resolved by the caller, since this type
    /// doesn't have access to the event list), and any other target
    /// defaults to zero.
    pub fn effective_time_ms(&self, event_timestamp_ms: Option<i64>) -> i64 {
        match &self.target {
            AnnotationTarget::TimeRange { start_ms, .. } => *start_ms,
            AnnotationTarget::Event { .. } => event_timestamp_ms.unwrap_or(0),
            AnnotationTarget::Session => 0,
        }
    }
}
