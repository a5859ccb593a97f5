//! Agent runtime
//!
//! The streaming agent contract ([`StreamingAgent`]), the tool-calling loop
//! ([`AgentExecutor`]), the two concrete agents and the [`AgentRuntime`] that
//! builds them from a shared provider and tool registry.

pub mod agents;
pub mod executor;
pub mod runtime;
pub mod streaming;

pub use agents::{SimpleAgent, SimpleConfig, ToolAgent};
pub use executor::{AgentExecutor, AgentExecutorBuilder, ExecutorConfig, MAX_ITERATIONS_NOTICE};
pub use runtime::{AgentRuntime, AgentRuntimeBuilder, RuntimeConfig};
pub use streaming::{SnapshotStream, StreamingAgent, final_text, last_snapshot, run_to_text};
