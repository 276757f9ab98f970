mod event;
pub mod payload;

pub use event::Event;
pub use payload::{
    AudioFormat, AudioPayload, AudioTranscriptionPayload, ContextBuildEvent, EventPayload,
    MessagePayload, MiddlewareLifecycle, Phase, PipelineLifecycle, ProviderCallLifecycle,
    StateEvent, ToolCallLifecycle, ValidationLifecycle, VideoFramePayload,
    WorkflowCompletionPayload, WorkflowTransitionPayload,
};
