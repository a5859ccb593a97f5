//! Orchestrator configuration

use serde::{Deserialize, Serialize};

/// Text item appended to the user's last message for the planning call
pub const PLAN_INSTRUCTION: &str =
    "根据可使用的工具和上面的问题，将问题拆解成多个子任务，并以json格式返回，不要直接调用方法";

/// Prefix of the synthetic message that asks the planner to summarize
pub const SUMMARY_PREFIX: &str = "请帮我汇总以下信息，并进行总结。不要使用json格式。";

/// What to do when the executor fails on one sub-task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskFailurePolicy {
    /// End the whole run with the error
    #[default]
    FailFast,
    /// Record the failure as that sub-task's result and keep going
    Recover,
}

/// Configuration for [`TaskSplitOrchestrator`](crate::TaskSplitOrchestrator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Instruction appended to the last message before planning
    pub plan_instruction: String,

    /// Prefix of the summary request
    pub summary_prefix: String,

    /// Upper bound on executed sub-tasks; extra ones are dropped
    pub max_subtasks: Option<usize>,

    /// Executor failure handling
    pub failure_policy: SubTaskFailurePolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            plan_instruction: PLAN_INSTRUCTION.to_string(),
            summary_prefix: SUMMARY_PREFIX.to_string(),
            max_subtasks: None,
            failure_policy: SubTaskFailurePolicy::FailFast,
        }
    }
}

impl OrchestratorConfig {
    /// Build the summary request text from the collected sub-task results
    pub fn summary_request(&self, results: &[String]) -> String {
        format!("{}{}", self.summary_prefix, results.join("\n"))
    }
}
