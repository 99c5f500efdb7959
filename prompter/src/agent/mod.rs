//! Assistant invocation layer
//!
//! The orchestration engines only see the [`AgentClient`] trait: hand over a
//! prompt, get back stdout and an optional conversation session id. The
//! default implementation shells out to the Claude CLI.

use std::time::Duration;

use async_trait::async_trait;

mod claude;
mod error;

pub use claude::ClaudeCliClient;
pub use error::AgentError;

/// A single prompt invocation
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    pub prompt: String,

    /// Extra system prompt appended to the assistant's own
    pub system_prompt: Option<String>,

    /// Conversation to resume instead of starting fresh
    pub resume_session: Option<String>,

    /// Upper bound on the invocation; unbounded when absent
    pub timeout: Option<Duration>,
}

/// What the assistant produced
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub output: String,

    /// Opaque id identifying the conversation, when the assistant reports one
    pub session_id: Option<String>,
}

/// Client for the external AI coding assistant
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn run_prompt(&self, request: PromptRequest) -> Result<AgentResponse, AgentError>;
}
