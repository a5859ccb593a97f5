//! Task-splitting orchestrator
//!
//! One run goes through three strictly sequential phases:
//!
//! 1. **Plan**: the planner sees the caller's transcript with an instruction
//!    appended to the last message and answers with a JSON list of sub-tasks.
//! 2. **Execute**: each sub-task runs on the executor agent in a fresh
//!    transcript holding only that task, one after another.
//! 3. **Summarize**: the planner gets a single message with every sub-task
//!    result and writes the final answer.
//!
//! If the plan is not a valid sub-task list, the planner's text is emitted as
//! the final answer and the run ends after phase 1.
//!
//! Every item of the returned stream is a cumulative snapshot: all messages the
//! run has produced so far, followed by the in-progress output of the current
//! agent.

use std::sync::Arc;

use agent_core::{Agent, Context, Error, Result, context::keys};
use agent_llm::Message;
use agent_runtime::{SnapshotStream, StreamingAgent, final_text, last_snapshot};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{OrchestratorConfig, SubTaskFailurePolicy};
use crate::plan::{ParseOutcome, parse_plan};

/// Plans with one agent, executes sub-tasks with another, then summarizes
pub struct TaskSplitOrchestrator {
    name: String,
    planner: Arc<dyn StreamingAgent>,
    executor: Arc<dyn StreamingAgent>,
    config: OrchestratorConfig,
}

impl TaskSplitOrchestrator {
    /// Create an orchestrator with default configuration
    pub fn new(planner: Arc<dyn StreamingAgent>, executor: Arc<dyn StreamingAgent>) -> Self {
        Self {
            name: "task-split-orchestrator".to_string(),
            planner,
            executor,
            config: OrchestratorConfig::default(),
        }
    }

    /// Create a builder
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// The orchestrator configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run with a cancellation token.
    ///
    /// Cancelling the token makes the stream yield `Err(Error::Cancelled)` at
    /// the next suspension point and end. Dropping the stream abandons the
    /// run the same way, without the error item.
    pub fn run_with_cancellation(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> SnapshotStream<'_> {
        self.run_inner(messages, cancel, Uuid::new_v4())
    }

    fn run_inner(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
        run_id: Uuid,
    ) -> SnapshotStream<'_> {
        Box::pin(async_stream::try_stream! {
            let mut accumulator: Vec<Message> = Vec::new();
            check_cancelled(&cancel)?;
            info!(%run_id, agent = %self.name, input_messages = messages.len(), "orchestrator run started");

            // Plan
            let plan_input = with_instruction(messages, &self.config.plan_instruction);
            let mut plan = Vec::new();
            {
                let mut stream = self.planner.run(plan_input);
                while let Some(item) = next_or_cancelled(&mut stream, &cancel).await {
                    let snapshot = item?;
                    yield concat(&accumulator, &snapshot);
                    plan = snapshot;
                }
            }
            let Some(plan_result) = plan.last() else {
                Err::<(), _>(Error::ProcessingFailed(format!(
                    "planner {} produced no messages",
                    self.planner.name()
                )))?;
                return;
            };
            let plan_text = plan_result.full_text();

            // Parse
            let tasks = match parse_plan(&plan_text) {
                ParseOutcome::SubTasks(tasks) => tasks,
                ParseOutcome::DirectAnswer(text) => {
                    warn!(%run_id, "plan is not a sub-task list, answering directly");
                    accumulator.extend_from_slice(&plan[..plan.len() - 1]);
                    accumulator.push(Message::assistant(text));
                    yield accumulator.clone();
                    return;
                }
            };
            accumulator.extend(plan);
            let tasks = match self.config.max_subtasks {
                Some(max) if tasks.len() > max => {
                    warn!(%run_id, planned = tasks.len(), max, "dropping sub-tasks beyond the limit");
                    tasks.into_iter().take(max).collect()
                }
                _ => tasks,
            };
            info!(%run_id, subtask_count = tasks.len(), "plan parsed");

            // Execute
            let mut results = Vec::with_capacity(tasks.len());
            for (index, sub_task) in tasks.iter().enumerate() {
                check_cancelled(&cancel)?;
                info!(%run_id, index, task = %sub_task.task, "executing sub-task");

                let mut output = Vec::new();
                let mut failure = None;
                {
                    let mut stream = self.executor.run(vec![Message::user(sub_task.task.clone())]);
                    while let Some(item) = next_or_cancelled(&mut stream, &cancel).await {
                        match item {
                            Ok(snapshot) => {
                                yield concat(&accumulator, &snapshot);
                                output = snapshot;
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                }

                if let Some(e) = failure {
                    if e.is_cancelled() || self.config.failure_policy == SubTaskFailurePolicy::FailFast {
                        warn!(%run_id, index, error = %e, "sub-task failed, aborting run");
                        Err::<(), _>(e)?;
                        return;
                    }
                    warn!(%run_id, index, error = %e, "sub-task failed, recording failure");
                    output.push(Message::assistant(format!(
                        "子任务执行失败：{}（{e}）",
                        sub_task.task
                    )));
                    yield concat(&accumulator, &output);
                }

                let result = final_text(&output);
                debug!(%run_id, index, result_length = result.len(), "sub-task finished");
                results.push(result);
                accumulator.extend(output);
            }

            // Summarize
            check_cancelled(&cancel)?;
            info!(%run_id, result_count = results.len(), "summarizing");
            let summary_request = Message::user(self.config.summary_request(&results));
            {
                let mut stream = self.planner.run(vec![summary_request]);
                while let Some(item) = next_or_cancelled(&mut stream, &cancel).await {
                    let snapshot = item?;
                    yield concat(&accumulator, &snapshot);
                }
            }
            info!(%run_id, "orchestrator run finished");
        })
    }
}

impl StreamingAgent for TaskSplitOrchestrator {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        self.run_with_cancellation(messages, CancellationToken::new())
    }
}

#[async_trait]
impl Agent for TaskSplitOrchestrator {
    async fn process(&self, input: String, context: &mut Context) -> Result<String> {
        let run_id = Uuid::new_v4();
        context.insert(keys::RUN_ID, serde_json::json!(run_id.to_string()));
        let snapshot = last_snapshot(self.run_inner(
            vec![Message::user(input)],
            CancellationToken::new(),
            run_id,
        ))
        .await?;
        Ok(final_text(&snapshot))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`TaskSplitOrchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    name: Option<String>,
    planner: Option<Arc<dyn StreamingAgent>>,
    executor: Option<Arc<dyn StreamingAgent>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    /// Set the orchestrator name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the planning and summarizing agent
    pub fn planner(mut self, planner: Arc<dyn StreamingAgent>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Set the sub-task agent
    pub fn executor(mut self, executor: Arc<dyn StreamingAgent>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound the number of executed sub-tasks
    pub fn max_subtasks(mut self, max: usize) -> Self {
        self.config.max_subtasks = Some(max);
        self
    }

    /// Set the sub-task failure policy
    pub fn failure_policy(mut self, policy: SubTaskFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<TaskSplitOrchestrator> {
        let planner = self
            .planner
            .ok_or_else(|| Error::InitializationFailed("Planner agent not set".to_string()))?;
        let executor = self
            .executor
            .ok_or_else(|| Error::InitializationFailed("Executor agent not set".to_string()))?;
        if self.config.max_subtasks == Some(0) {
            return Err(Error::InitializationFailed(
                "max_subtasks must be greater than 0".to_string(),
            ));
        }

        let mut orchestrator = TaskSplitOrchestrator::new(planner, executor);
        orchestrator.config = self.config;
        if let Some(name) = self.name {
            orchestrator.name = name;
        }
        Ok(orchestrator)
    }
}

/// Copy of the transcript with the instruction appended to the last message
fn with_instruction(mut messages: Vec<Message>, instruction: &str) -> Vec<Message> {
    match messages.last_mut() {
        Some(last) => last.append_text(instruction),
        None => messages.push(Message::user(instruction)),
    }
    messages
}

fn concat(accumulator: &[Message], tail: &[Message]) -> Vec<Message> {
    let mut snapshot = Vec::with_capacity(accumulator.len() + tail.len());
    snapshot.extend_from_slice(accumulator);
    snapshot.extend_from_slice(tail);
    snapshot
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Next item of an agent stream, or a cancellation error if the token fires first
async fn next_or_cancelled(
    stream: &mut SnapshotStream<'_>,
    cancel: &CancellationToken,
) -> Option<Result<Vec<Message>>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Some(Err(Error::Cancelled)),
        item = stream.next() => item,
    }
}
