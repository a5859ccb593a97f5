//! Stock assistant assembly
//!
//! Wires the data tools, the two system prompts and the LLM provider into a
//! [`TaskSplitOrchestrator`]: the planner splits the question into sub-tasks,
//! the executor answers each one with the tools, and the planner summarizes.

use std::sync::Arc;

use agent_llm::{LLMProvider, Message};
use agent_orchestrator::{OrchestratorConfig, SubTaskFailurePolicy, TaskSplitOrchestrator};
use agent_runtime::{AgentRuntime, RuntimeConfig, SnapshotStream, StreamingAgent, run_to_text};
use agent_tools::ToolRegistry;
use chrono::{Local, NaiveDate};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::prompts::Prompts;
use crate::tools::register_tools;

/// Name shared by the planner, the executor and the orchestrator
pub const ASSISTANT_NAME: &str = "股票助手";

/// A ready-to-run stock analysis assistant
pub struct StockAssistant {
    orchestrator: TaskSplitOrchestrator,
    tools: Arc<ToolRegistry>,
}

impl StockAssistant {
    /// Create a builder
    pub fn builder() -> StockAssistantBuilder {
        StockAssistantBuilder::default()
    }

    /// The underlying orchestrator
    pub fn orchestrator(&self) -> &TaskSplitOrchestrator {
        &self.orchestrator
    }

    /// Tools visible to the agents
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run over a transcript, yielding cumulative snapshots
    pub fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        self.orchestrator.run(messages)
    }

    /// Run over a transcript until the token is cancelled
    pub fn run_with_cancellation(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> SnapshotStream<'_> {
        self.orchestrator.run_with_cancellation(messages, cancel)
    }

    /// Answer a single question and return the final text
    pub async fn ask(&self, question: impl Into<String>) -> Result<String> {
        Ok(run_to_text(&self.orchestrator, question.into()).await?)
    }
}

impl StreamingAgent for StockAssistant {
    fn name(&self) -> &str {
        self.orchestrator.name()
    }

    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        self.orchestrator.run(messages)
    }
}

/// Builder for [`StockAssistant`]
pub struct StockAssistantBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    runtime: RuntimeConfig,
    stock: Option<Arc<StockConfig>>,
    orchestrator: OrchestratorConfig,
    registry: Option<Arc<ToolRegistry>>,
    planner_tools: bool,
    date: Option<NaiveDate>,
}

impl Default for StockAssistantBuilder {
    fn default() -> Self {
        Self {
            provider: None,
            runtime: RuntimeConfig::default(),
            stock: None,
            orchestrator: OrchestratorConfig::default(),
            registry: None,
            planner_tools: true,
            date: None,
        }
    }
}

impl StockAssistantBuilder {
    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the runtime defaults
    pub fn runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime = config;
        self
    }

    /// Set the model used by both agents
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.runtime.default_model = model.into();
        self
    }

    /// Set the data access configuration
    pub fn stock_config(mut self, config: Arc<StockConfig>) -> Self {
        self.stock = Some(config);
        self
    }

    /// Bound the number of executed sub-tasks
    pub fn max_subtasks(mut self, max: usize) -> Self {
        self.orchestrator.max_subtasks = Some(max);
        self
    }

    /// Set what happens when a sub-task fails
    pub fn failure_policy(mut self, policy: SubTaskFailurePolicy) -> Self {
        self.orchestrator.failure_policy = policy;
        self
    }

    /// Whether the planner is offered the tool list
    pub fn planner_tools(mut self, enabled: bool) -> Self {
        self.planner_tools = enabled;
        self
    }

    /// Use this registry as is instead of registering the data tools
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Date rendered into the prompts, today by default
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Build the assistant
    pub fn build(self) -> Result<StockAssistant> {
        let provider = self
            .provider
            .ok_or_else(|| StockError::ConfigError("LLM provider not set".to_string()))?;

        let tools = match self.registry {
            Some(registry) => registry,
            None => {
                let stock = match self.stock {
                    Some(config) => config,
                    None => Arc::new(StockConfig::default()),
                };
                stock.validate()?;
                let registry = Arc::new(ToolRegistry::new());
                register_tools(&registry, stock)?;
                registry
            }
        };

        let runtime = AgentRuntime::builder()
            .provider(provider)
            .tool_registry(tools.clone())
            .config(self.runtime)
            .build()?;

        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        let prompts = Prompts::new()?;
        let planner_prompt = Some(prompts.planner(date)?);
        let executor_prompt = Some(prompts.executor(date)?);

        let planner: Arc<dyn StreamingAgent> = if self.planner_tools {
            Arc::new(runtime.create_tool_agent(planner_prompt, ASSISTANT_NAME))
        } else {
            Arc::new(runtime.create_simple_agent(planner_prompt, ASSISTANT_NAME))
        };
        let executor: Arc<dyn StreamingAgent> =
            Arc::new(runtime.create_tool_agent(executor_prompt, ASSISTANT_NAME));

        let orchestrator = TaskSplitOrchestrator::builder()
            .name(ASSISTANT_NAME)
            .planner(planner)
            .executor(executor)
            .config(self.orchestrator)
            .build()?;

        info!(
            tools = tools.len(),
            planner_tools = self.planner_tools,
            max_subtasks = ?orchestrator.config().max_subtasks,
            %date,
            "stock assistant ready"
        );
        Ok(StockAssistant { orchestrator, tools })
    }
}
