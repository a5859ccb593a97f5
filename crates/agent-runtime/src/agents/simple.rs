//! Simple agent implementation (LLM only, no tools)

use crate::streaming::{SnapshotStream, StreamingAgent, run_to_text};
use agent_core::{Agent, Context, Error, Result};
use agent_llm::{CompletionRequest, LLMProvider, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Configuration for a simple agent
#[derive(Debug, Clone)]
pub struct SimpleConfig {
    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature for sampling
    pub temperature: f32,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            model: "qwen-plus".to_string(),
            system_prompt: None,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// A single-call agent that never runs tools.
///
/// Its stream has exactly one snapshot: the assistant reply.
pub struct SimpleAgent {
    provider: Arc<dyn LLMProvider>,
    config: SimpleConfig,
    name: String,
}

impl SimpleAgent {
    /// Create a new simple agent
    pub fn new(provider: Arc<dyn LLMProvider>, config: SimpleConfig, name: impl Into<String>) -> Self {
        Self {
            provider,
            config,
            name: name.into(),
        }
    }

    /// Get the agent's configuration
    pub fn config(&self) -> &SimpleConfig {
        &self.config
    }

    fn build_request(&self, messages: Vec<Message>) -> CompletionRequest {
        let mut builder = CompletionRequest::builder(&self.config.model)
            .messages(messages)
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature);
        if let Some(system) = &self.config.system_prompt {
            builder = builder.system(system.clone());
        }
        builder.build()
    }
}

impl StreamingAgent for SimpleAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        Box::pin(async_stream::try_stream! {
            let response = self
                .provider
                .complete(self.build_request(messages))
                .await
                .map_err(Error::from)?;
            yield vec![response.message];
        })
    }
}

#[async_trait]
impl Agent for SimpleAgent {
    async fn process(&self, input: String, _context: &mut Context) -> Result<String> {
        run_to_text(self, input).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
