//! Assistant turn loop: tool-call accumulation, tool execution, and the
//! streaming orchestrator that drives multi-round answers.

pub mod accumulator;
pub mod orchestrator;
pub mod tools;

pub use accumulator::{PreparedToolCall, ToolCallAccumulator};
pub use orchestrator::{AssistantEvent, OrchestratorConfig, StreamOrchestrator};
pub use tools::{image_tool_definition, GoogleImageSearch, ToolInvocation, GET_IMAGE_SRC};
