//! Runtime holding the shared provider and tools
//!
//! The AgentRuntime owns the LLM provider, the tool registry and the model
//! defaults, and hands out agents built from them.

use agent_core::Result;
use agent_llm::LLMProvider;
use agent_tools::ToolRegistry;
use std::sync::Arc;
use tracing::info;

use crate::agents::{SimpleAgent, SimpleConfig, ToolAgent};
use crate::executor::{AgentExecutor, ExecutorConfig};

/// Configuration for the agent runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Default maximum iterations for tool-using agents
    pub default_max_iterations: usize,

    /// Default model to use
    pub default_model: String,

    /// Default generation budget
    pub default_max_tokens: usize,

    /// Default sampling temperature
    pub default_temperature: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_max_iterations: 20,
            default_model: "qwen-plus".to_string(),
            default_max_tokens: 4096,
            default_temperature: 0.7,
        }
    }
}

/// Shared resources for building agents
///
/// ```no_run
/// use agent_runtime::AgentRuntime;
/// use agent_tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # fn example(provider: Arc<dyn agent_llm::LLMProvider>) -> agent_core::Result<()> {
/// let runtime = AgentRuntime::builder()
///     .provider(provider)
///     .tool_registry(Arc::new(ToolRegistry::new()))
///     .build()?;
///
/// let executor = runtime.create_tool_agent(Some("你是一个股票分析助手".into()), "股票助手");
/// let planner = runtime.create_simple_agent(None, "planner");
/// # Ok(())
/// # }
/// ```
pub struct AgentRuntime {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: RuntimeConfig,
}

impl AgentRuntime {
    /// Create a new agent runtime
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
        }
    }

    /// Create a new runtime builder
    pub fn builder() -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::new()
    }

    /// Get a reference to the LLM provider
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Get a reference to the tool registry
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }

    /// Get a reference to the runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Executor configuration filled from the runtime defaults
    pub fn executor_config(&self, system_prompt: Option<String>) -> ExecutorConfig {
        ExecutorConfig {
            max_iterations: self.config.default_max_iterations,
            model: self.config.default_model.clone(),
            system_prompt,
            max_tokens: self.config.default_max_tokens,
            temperature: Some(self.config.default_temperature),
        }
    }

    /// Create a simple agent (LLM only, no tools)
    pub fn create_simple_agent(
        &self,
        system_prompt: Option<String>,
        name: impl Into<String>,
    ) -> SimpleAgent {
        let config = SimpleConfig {
            model: self.config.default_model.clone(),
            system_prompt,
            max_tokens: self.config.default_max_tokens,
            temperature: self.config.default_temperature,
        };
        SimpleAgent::new(self.provider.clone(), config, name)
    }

    /// Create a tool-using agent over the shared registry
    pub fn create_tool_agent(
        &self,
        system_prompt: Option<String>,
        name: impl Into<String>,
    ) -> ToolAgent {
        self.create_tool_agent_with(self.executor_config(system_prompt), name)
    }

    /// Create a tool-using agent with an explicit executor configuration
    pub fn create_tool_agent_with(
        &self,
        config: ExecutorConfig,
        name: impl Into<String>,
    ) -> ToolAgent {
        let executor =
            AgentExecutor::new(self.provider.clone(), self.tool_registry.clone(), config);
        ToolAgent::new(executor, name)
    }
}

/// Builder for AgentRuntime
pub struct AgentRuntimeBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Option<Arc<ToolRegistry>>,
    config: RuntimeConfig,
}

impl AgentRuntimeBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: None,
            config: RuntimeConfig::default(),
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = Some(registry);
        self
    }

    /// Set the runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    /// Set the default iteration bound
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.default_max_iterations = max;
        self
    }

    /// Build the runtime
    pub fn build(self) -> Result<AgentRuntime> {
        let provider = self.provider.ok_or_else(|| {
            agent_core::Error::InitializationFailed("Provider not set".to_string())
        })?;
        let tool_registry = self
            .tool_registry
            .unwrap_or_else(|| Arc::new(ToolRegistry::new()));

        info!(
            provider = provider.name(),
            model = %self.config.default_model,
            tool_count = tool_registry.len(),
            "agent runtime ready"
        );
        Ok(AgentRuntime::new(provider, tool_registry, self.config))
    }
}

impl Default for AgentRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
