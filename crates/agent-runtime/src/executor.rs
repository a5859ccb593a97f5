//! Agent executor for running tool-calling loops
//!
//! The loop:
//! 1. Call the LLM with the transcript and the registered tools
//! 2. Emit the assistant message
//! 3. If it requested tools, execute them, emit the results and loop back
//! 4. Otherwise stop
//!
//! Every emission is a cumulative snapshot of the messages the run added.

use agent_core::{Error, Result};
use agent_llm::{CompletionRequest, ContentBlock, LLMProvider, Message, StopReason, ToolDefinition};
use agent_tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::streaming::{SnapshotStream, final_text, last_snapshot};

/// Notice emitted when the loop runs out of iterations
pub const MAX_ITERATIONS_NOTICE: &str = "已达到最大调用轮数，停止继续调用工具。";

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of LLM calls per run
    pub max_iterations: usize,

    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            model: "qwen-plus".to_string(),
            system_prompt: None,
            max_tokens: 4096,
            temperature: Some(0.7),
        }
    }
}

/// Executes an agent loop: LLM → tool calls → execution → loop back
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutor {
    /// Create a new agent executor
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
        }
    }

    /// Create a builder
    pub fn builder() -> AgentExecutorBuilder {
        AgentExecutorBuilder::new()
    }

    /// The executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the loop over a single user message and return the final text
    pub async fn run(&self, user_message: String) -> Result<String> {
        let snapshot = last_snapshot(self.run_stream(vec![Message::user(user_message)])).await?;
        Ok(final_text(&snapshot))
    }

    /// Run the loop over a transcript, streaming cumulative snapshots.
    ///
    /// Provider faults end the stream with an `Err`. Tool faults and unknown
    /// tools are reported back to the model as error results instead.
    pub fn run_stream(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        Box::pin(async_stream::try_stream! {
            let mut conversation = messages;
            let mut produced: Vec<Message> = Vec::new();
            let tools = self.build_tool_definitions();
            let mut iteration = 0;

            loop {
                iteration += 1;
                if iteration > self.config.max_iterations {
                    warn!(
                        max_iterations = self.config.max_iterations,
                        "max iterations reached, stopping"
                    );
                    produced.push(Message::assistant(MAX_ITERATIONS_NOTICE));
                    yield produced.clone();
                    break;
                }

                info!(
                    iteration,
                    model = %self.config.model,
                    tool_count = tools.len(),
                    "sending request to LLM"
                );

                let response = self
                    .provider
                    .complete(self.build_request(&conversation, &tools))
                    .await
                    .map_err(Error::from)?;

                info!(
                    stop_reason = ?response.stop_reason,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    total_tokens = response.usage.total(),
                    "LLM response received"
                );
                let preview: String = response.message.full_text().chars().take(300).collect();
                debug!(response_preview = %preview, "LLM response content preview");

                let message = response.message;
                conversation.push(message.clone());
                produced.push(message.clone());
                yield produced.clone();

                // Let the snapshot reach the consumer before tools start running.
                tokio::task::yield_now().await;

                if !message.has_tool_uses() {
                    match response.stop_reason {
                        StopReason::MaxTokens => warn!("response truncated by token limit"),
                        StopReason::ToolUse => warn!("tool use stop reason without tool calls"),
                        StopReason::EndTurn | StopReason::StopSequence => {}
                    }
                    info!(iteration, "agent completed");
                    break;
                }

                let results = self.execute_tools(&message).await;
                info!(result_count = results.len(), "tool execution completed, continuing");
                conversation.extend(results.iter().cloned());
                produced.extend(results);
                yield produced.clone();
            }
        })
    }

    fn build_request(&self, conversation: &[Message], tools: &[ToolDefinition]) -> CompletionRequest {
        let mut builder = CompletionRequest::builder(&self.config.model)
            .messages(conversation.to_vec())
            .max_tokens(self.config.max_tokens)
            .tools(tools.to_vec());
        if let Some(system) = &self.config.system_prompt {
            builder = builder.system(system.clone());
        }
        if let Some(temperature) = self.config.temperature {
            builder = builder.temperature(temperature);
        }
        builder.build()
    }

    /// Build tool definitions from the registry
    fn build_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_registry
            .list_tools()
            .iter()
            .map(|tool| ToolDefinition::new(tool.name(), tool.description(), tool.input_schema()))
            .collect()
    }

    /// Execute every tool call of an assistant message, in order
    async fn execute_tools(&self, message: &Message) -> Vec<Message> {
        let mut results = Vec::new();
        for block in message.tool_uses() {
            if let ContentBlock::ToolUse { id, name, input } = block {
                results.push(self.execute_tool(id, name, input).await);
            }
        }
        results
    }

    async fn execute_tool(&self, id: &str, name: &str, input: &Value) -> Message {
        let input_preview: String = input.to_string().chars().take(500).collect();
        info!(tool_name = %name, tool_id = %id, input_preview = %input_preview, "executing tool");

        let Some(tool) = self.tool_registry.get(name) else {
            warn!(tool_name = %name, "model requested an unknown tool");
            return Message::tool_error(id, format!("Tool not found: {name}"));
        };

        let start = Instant::now();
        match tool.execute(input.clone()).await {
            Ok(result) => {
                let result_str = result.to_string();
                info!(
                    tool_name = %name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    result_length = result_str.len(),
                    reported_error = agent_tools::is_error_payload(&result),
                    "tool execution finished"
                );
                Message::tool_result(id, result_str)
            }
            Err(e) => {
                warn!(
                    tool_name = %name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "tool execution failed"
                );
                Message::tool_error(id, format!("Error: {e}"))
            }
        }
    }
}

/// Builder for AgentExecutor
pub struct AgentExecutorBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl AgentExecutorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: Arc::new(ToolRegistry::new()),
            config: ExecutorConfig::default(),
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = registry;
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum iterations
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set max tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Build the executor
    pub fn build(self) -> Result<AgentExecutor> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;

        Ok(AgentExecutor::new(provider, self.tool_registry, self.config))
    }
}

impl Default for AgentExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
