use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle phase shared by pipeline, middleware, provider-call and
/// tool-call events. Kept as a single enum rather than three started/
/// completed/failed event families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Started,
    Completed,
    Failed,
}

/// Event payload variants, one per event-type family. The `event_type`
/// string on `Event` carries the concrete dotted tag (e.g.
/// `pipeline.started`); the payload variant carries the fields common to
/// that family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    Pipeline(PipelineLifecycle),
    Middleware(MiddlewareLifecycle),
    ProviderCall(ProviderCallLifecycle),
    ToolCall(ToolCallLifecycle),
    Validation(ValidationLifecycle),
    ContextBuild(ContextBuildEvent),
    State(StateEvent),
    MessageCreated(MessagePayload),
    MessageUpdated(MessagePayload),
    AudioInput(AudioPayload),
    AudioOutput(AudioPayload),
    AudioTranscription(AudioTranscriptionPayload),
    VideoFrame(VideoFramePayload),
    WorkflowTransition(WorkflowTransitionPayload),
    WorkflowCompletion(WorkflowCompletionPayload),
    /// Fallback for event types the reader doesn't model yet. Producers may
    /// publish any `event_type` string; subscribe-all listeners still see
    /// it and the store still persists it opaquely.
    Unknown(Value),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineLifecycle {
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiddlewareLifecycle {
    pub name: String,
    pub index: u32,
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCallLifecycle {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallLifecycle {
    pub tool_name: String,
    pub call_id: String,
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationLifecycle {
    pub target: String,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextBuildEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateEvent {
    /// "load" or "save".
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePayload {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<Value>,
}

/// Format metadata shared by audio segments, independent of which track
/// (input/output) they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: String,
    #[serde(default)]
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            encoding: "pcm".to_string(),
            bits_per_sample: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioPayload {
    pub payload: crate::binary::BinaryPayload,
    pub format: AudioFormat,
    pub duration_ms: u64,
    pub chunk_index: u64,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTranscriptionPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFramePayload {
    pub payload: crate::binary::BinaryPayload,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub frame_index: u64,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub is_keyframe: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowTransitionPayload {
    pub from_state: String,
    pub to_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowCompletionPayload {
    pub final_state: String,
    #[serde(default)]
    pub succeeded: bool,
}
