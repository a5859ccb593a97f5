//! Task-splitting orchestration
//!
//! [`TaskSplitOrchestrator`] answers a question in three phases: a planner
//! agent breaks it into sub-tasks, an executor agent works through them one
//! by one, and the planner summarizes the results. Runs are exposed as lazy
//! streams of cumulative message snapshots.
//!
//! ```no_run
//! use agent_orchestrator::TaskSplitOrchestrator;
//! use agent_runtime::{StreamingAgent, last_snapshot};
//! use agent_llm::Message;
//! use std::sync::Arc;
//!
//! # async fn example(planner: Arc<dyn StreamingAgent>, executor: Arc<dyn StreamingAgent>) -> agent_core::Result<()> {
//! let orchestrator = TaskSplitOrchestrator::builder()
//!     .planner(planner)
//!     .executor(executor)
//!     .build()?;
//!
//! let last = last_snapshot(orchestrator.run(vec![Message::user("分析AAPL")])).await?;
//! println!("{}", agent_runtime::final_text(&last));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod orchestrator;
pub mod plan;

pub use config::{OrchestratorConfig, PLAN_INSTRUCTION, SUMMARY_PREFIX, SubTaskFailurePolicy};
pub use orchestrator::{OrchestratorBuilder, TaskSplitOrchestrator};
pub use plan::{ParseOutcome, SubTask, parse_plan};
