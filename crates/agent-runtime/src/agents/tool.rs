//! Tool agent implementation (wraps AgentExecutor)

use crate::executor::AgentExecutor;
use crate::streaming::{SnapshotStream, StreamingAgent};
use agent_core::{Agent, Context, Result};
use async_trait::async_trait;
use agent_llm::Message;

/// An agent that runs the LLM loop with tool execution
pub struct ToolAgent {
    executor: AgentExecutor,
    name: String,
}

impl ToolAgent {
    /// Create a tool agent from an executor and a name
    pub fn new(executor: AgentExecutor, name: impl Into<String>) -> Self {
        Self {
            executor,
            name: name.into(),
        }
    }

    /// Get a reference to the underlying executor
    pub fn executor(&self) -> &AgentExecutor {
        &self.executor
    }
}

impl StreamingAgent for ToolAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        self.executor.run_stream(messages)
    }
}

#[async_trait]
impl Agent for ToolAgent {
    async fn process(&self, input: String, _context: &mut Context) -> Result<String> {
        self.executor.run(input).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
