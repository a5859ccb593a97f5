//! End-to-end behaviour of the orchestrator against scripted agents

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent_core::{Agent, Context, Error, Result};
use agent_llm::{ContentBlock, Message, MessageContent, Role};
use agent_orchestrator::{
    PLAN_INSTRUCTION, SUMMARY_PREFIX, SubTaskFailurePolicy, TaskSplitOrchestrator,
};
use agent_runtime::{SnapshotStream, StreamingAgent, final_text, last_snapshot};
use futures::StreamExt;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

type Script = Vec<Result<Vec<Message>>>;

/// Agent that replays one script per call and records what it was given
struct ScriptedAgent {
    name: String,
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Vec<Message>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAgent {
    fn new(name: &str, scripts: Vec<Script>, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            scripts: Mutex::new(scripts.into()),
            calls: Mutex::new(Vec::new()),
            log,
        })
    }

    fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

impl StreamingAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        let label = messages.last().map(Message::full_text).unwrap_or_default();
        self.calls.lock().unwrap().push(messages);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let log = self.log.clone();
        let name = self.name.clone();

        Box::pin(async_stream::stream! {
            log.lock().unwrap().push(format!("{name}:start:{label}"));
            for item in script {
                tokio::task::yield_now().await;
                yield item;
            }
            log.lock().unwrap().push(format!("{name}:end:{label}"));
        })
    }
}

/// Snapshots of a single assistant message whose text grows chunk by chunk
fn streamed_text(chunks: &[&str]) -> Script {
    let mut text = String::new();
    chunks
        .iter()
        .map(|chunk| {
            text.push_str(chunk);
            Ok(vec![Message::assistant(text.clone())])
        })
        .collect()
}

/// Executor transcript: tool call, tool result, final answer
fn tool_round(tool: &str, result: serde_json::Value, answer: &str) -> Script {
    let call = Message::from_blocks(
        Role::Assistant,
        vec![ContentBlock::ToolUse {
            id: format!("call_{tool}"),
            name: tool.to_string(),
            input: json!({"ticker": "AAPL"}),
        }],
    );
    let result = Message::tool_result(format!("call_{tool}"), result.to_string());
    vec![
        Ok(vec![call.clone()]),
        Ok(vec![call.clone(), result.clone()]),
        Ok(vec![call, result, Message::assistant(answer)]),
    ]
}

const AAPL_PLAN: &str = r#"[{"task": "查询AAPL股票价格"},{"task": "查询AAPL股票财务数据"}]"#;

fn log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

async fn collect(stream: SnapshotStream<'_>) -> Vec<Result<Vec<Message>>> {
    stream.collect().await
}

fn aapl_setup() -> (Arc<ScriptedAgent>, Arc<ScriptedAgent>, TaskSplitOrchestrator) {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![
            streamed_text(&[&AAPL_PLAN[..20], &AAPL_PLAN[20..]]),
            streamed_text(&["AAPL 当前股价 180 美元，", "2023 财年营收 3833 亿美元。"]),
        ],
        events.clone(),
    );
    let executor = ScriptedAgent::new(
        "executor",
        vec![
            tool_round("get_stock_info", json!({"currentPrice": 180.0}), "AAPL 当前价格为 180 美元"),
            tool_round(
                "get_financial_statements",
                json!({"total_revenue": 383_285_000_000_i64}),
                "AAPL 2023 财年营收 3833 亿美元",
            ),
        ],
        events,
    );
    let orchestrator = assert_ok!(
        TaskSplitOrchestrator::builder()
            .planner(planner.clone())
            .executor(executor.clone())
            .build()
    );
    (planner, executor, orchestrator)
}

#[tokio::test]
async fn test_aapl_scenario() {
    let (planner, executor, orchestrator) = aapl_setup();

    let items = collect(orchestrator.run(vec![Message::user("分析AAPL")])).await;
    let snapshots: Vec<Vec<Message>> = items.into_iter().map(|i| assert_ok!(i)).collect();
    let last = snapshots.last().unwrap();

    // planning call: original question plus the instruction item
    let planner_calls = planner.calls();
    assert_eq!(planner_calls.len(), 2);
    assert_eq!(
        planner_calls[0],
        vec![Message::from_blocks(
            Role::User,
            vec![ContentBlock::text("分析AAPL"), ContentBlock::text(PLAN_INSTRUCTION)],
        )]
    );

    // each sub-task in a fresh single-message transcript
    assert_eq!(
        executor.calls(),
        vec![
            vec![Message::user("查询AAPL股票价格")],
            vec![Message::user("查询AAPL股票财务数据")],
        ]
    );

    // summary call sees only the synthetic message
    assert_eq!(planner_calls[1].len(), 1);
    let summary_request = planner_calls[1][0].full_text();
    assert!(summary_request.starts_with("请帮我汇总以下信息"));
    assert_eq!(
        summary_request,
        format!("{SUMMARY_PREFIX}AAPL 当前价格为 180 美元\nAAPL 2023 财年营收 3833 亿美元")
    );

    // plan + 3 + 3 + summary
    assert_eq!(last.len(), 8);
    assert_eq!(last[0], Message::assistant(AAPL_PLAN));
    assert_eq!(
        final_text(last),
        "AAPL 当前股价 180 美元，2023 财年营收 3833 亿美元。"
    );
}

#[tokio::test]
async fn test_emissions_are_cumulative() {
    let (_, _, orchestrator) = aapl_setup();

    let snapshots: Vec<Vec<Message>> = collect(orchestrator.run(vec![Message::user("分析AAPL")]))
        .await
        .into_iter()
        .map(|i| assert_ok!(i))
        .collect();

    let last = snapshots.last().unwrap().clone();
    for pair in snapshots.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert!(next.len() >= prev.len());
        // everything but the in-progress tail is frozen
        let frozen = prev.len() - 1;
        assert_eq!(&next[..frozen], &prev[..frozen]);
    }
    for snapshot in &snapshots {
        let frozen = snapshot.len() - 1;
        assert_eq!(&snapshot[..frozen], &last[..frozen]);
    }
}

#[tokio::test]
async fn test_direct_answer_fallback() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![streamed_text(&["抱歉，", "我不太理解您的问题"])],
        events.clone(),
    );
    let executor = ScriptedAgent::new("executor", vec![], events);
    let orchestrator = TaskSplitOrchestrator::new(planner.clone(), executor.clone());

    let items = collect(orchestrator.run(vec![Message::user("今天天气如何")])).await;
    let last = assert_ok!(items.into_iter().last().unwrap());

    assert_eq!(last, vec![Message::assistant("抱歉，我不太理解您的问题")]);
    assert!(executor.calls().is_empty());
    assert_eq!(planner.calls().len(), 1);
}

#[tokio::test]
async fn test_subtasks_run_strictly_in_order() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![
            streamed_text(&[r#"[{"task": "A"}, {"task": "B"}]"#]),
            streamed_text(&["总结"]),
        ],
        events.clone(),
    );
    let executor = ScriptedAgent::new(
        "executor",
        vec![streamed_text(&["a1", "a2"]), streamed_text(&["b1"])],
        events.clone(),
    );
    let orchestrator = TaskSplitOrchestrator::new(planner, executor);

    let items = collect(orchestrator.run(vec![Message::user("q")])).await;
    assert!(items.iter().all(Result::is_ok));

    // planner labels carry the instruction or summary text; keep only the phase
    let events: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| {
            if e.starts_with("planner") {
                e.splitn(3, ':').take(2).collect::<Vec<_>>().join(":")
            } else {
                e.clone()
            }
        })
        .collect();
    assert_eq!(
        events,
        vec![
            "planner:start",
            "planner:end",
            "executor:start:A",
            "executor:end:A",
            "executor:start:B",
            "executor:end:B",
            "planner:start",
            "planner:end",
        ]
    );
}

#[tokio::test]
async fn test_error_payload_reaches_summary() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![
            streamed_text(&[r#"[{"task": "查询AAPL历史数据"}]"#]),
            streamed_text(&["暂时无法获取 AAPL 历史数据"]),
        ],
        events.clone(),
    );
    let executor = ScriptedAgent::new(
        "executor",
        vec![tool_round(
            "get_historical_data",
            json!({"error": "无法获取历史数据"}),
            "查询失败：无法获取历史数据",
        )],
        events,
    );
    let orchestrator = TaskSplitOrchestrator::new(planner.clone(), executor);

    let items = collect(orchestrator.run(vec![Message::user("AAPL 最近走势")])).await;
    let last = assert_ok!(items.into_iter().last().unwrap());

    assert!(last[2].full_text().contains("无法获取历史数据"));
    let summary_request = planner.calls()[1][0].full_text();
    assert!(summary_request.contains("无法获取历史数据"));
    assert_eq!(final_text(&last), "暂时无法获取 AAPL 历史数据");
}

#[tokio::test]
async fn test_executor_fault_fails_fast() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![streamed_text(&[r#"[{"task": "A"}, {"task": "B"}]"#])],
        events.clone(),
    );
    let executor = ScriptedAgent::new(
        "executor",
        vec![vec![
            Ok(vec![Message::assistant("partial")]),
            Err(Error::Llm("connection reset".into())),
        ]],
        events,
    );
    let orchestrator = TaskSplitOrchestrator::new(planner.clone(), executor.clone());

    let items = collect(orchestrator.run(vec![Message::user("q")])).await;
    let last = items.into_iter().last().unwrap();
    assert!(matches!(assert_err!(last), Error::Llm(_)));
    assert_eq!(executor.calls().len(), 1);
    assert_eq!(planner.calls().len(), 1);
}

#[tokio::test]
async fn test_executor_fault_recovered() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![
            streamed_text(&[r#"[{"task": "A"}, {"task": "B"}]"#]),
            streamed_text(&["summary"]),
        ],
        events.clone(),
    );
    let executor = ScriptedAgent::new(
        "executor",
        vec![
            vec![Err(Error::Llm("timeout".into()))],
            streamed_text(&["b done"]),
        ],
        events,
    );
    let orchestrator = assert_ok!(
        TaskSplitOrchestrator::builder()
            .planner(planner.clone())
            .executor(executor.clone())
            .failure_policy(SubTaskFailurePolicy::Recover)
            .build()
    );

    let items = collect(orchestrator.run(vec![Message::user("q")])).await;
    let last = assert_ok!(items.into_iter().last().unwrap());
    assert_eq!(final_text(&last), "summary");
    assert_eq!(executor.calls().len(), 2);

    let summary_request = planner.calls()[1][0].full_text();
    assert!(summary_request.contains("子任务执行失败：A"));
    assert!(summary_request.ends_with("\nb done"));
}

/// Every snapshot keeps all but the in-progress last message of the one before
fn assert_cumulative(snapshots: &[Vec<Message>]) {
    for (index, pair) in snapshots.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        assert!(next.len() >= prev.len(), "snapshot {} shrinks", index + 1);
        let frozen = prev.len().saturating_sub(1);
        assert_eq!(&next[..frozen], &prev[..frozen], "snapshot {} rewrites history", index + 1);
    }
}

#[tokio::test]
async fn test_recovered_failure_keeps_partial_output() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![streamed_text(&[r#"[{"task": "A"}]"#]), streamed_text(&["summary"])],
        events.clone(),
    );
    let mut partial = tool_round("get_stock_info", json!({"currentPrice": 180.0}), "unused");
    partial.truncate(2);
    partial.push(Err(Error::Llm("timeout".into())));
    let executor = ScriptedAgent::new("executor", vec![partial], events);
    let orchestrator = assert_ok!(
        TaskSplitOrchestrator::builder()
            .planner(planner.clone())
            .executor(executor)
            .failure_policy(SubTaskFailurePolicy::Recover)
            .build()
    );

    let snapshots: Vec<Vec<Message>> = collect(orchestrator.run(vec![Message::user("q")]))
        .await
        .into_iter()
        .map(|i| assert_ok!(i))
        .collect();
    assert_cumulative(&snapshots);

    let last = snapshots.last().unwrap();
    assert_eq!(final_text(last), "summary");
    assert!(last.iter().any(|m| m.role == Role::Tool));
    assert!(last.iter().any(Message::has_tool_uses));
    assert!(last.iter().any(|m| m.full_text().starts_with("子任务执行失败：A")));

    let summary_request = planner.calls()[1][0].full_text();
    assert!(summary_request.contains("子任务执行失败：A"));
}

#[tokio::test]
async fn test_fallback_after_planner_tool_calls() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![tool_round(
            "search_web_info",
            json!({"results": []}),
            "抱歉，我不太理解您的问题",
        )],
        events.clone(),
    );
    let executor = ScriptedAgent::new("executor", vec![], events);
    let orchestrator = TaskSplitOrchestrator::new(planner.clone(), executor.clone());

    let snapshots: Vec<Vec<Message>> = collect(orchestrator.run(vec![Message::user("你好")]))
        .await
        .into_iter()
        .map(|i| assert_ok!(i))
        .collect();
    assert_cumulative(&snapshots);

    let last = snapshots.last().unwrap();
    assert_eq!(last.len(), 3);
    assert_eq!(last.last(), Some(&Message::assistant("抱歉，我不太理解您的问题")));
    assert!(last[0].has_tool_uses());
    assert_eq!(last[1].role, Role::Tool);
    assert!(executor.calls().is_empty());
    assert_eq!(planner.calls().len(), 1);
}

#[tokio::test]
async fn test_max_subtasks_truncates_plan() {
    let events = log();
    let planner = ScriptedAgent::new(
        "planner",
        vec![
            streamed_text(&[r#"[{"task": "A"}, {"task": "B"}, {"task": "C"}]"#]),
            streamed_text(&["s"]),
        ],
        events.clone(),
    );
    let executor = ScriptedAgent::new(
        "executor",
        vec![streamed_text(&["a"]), streamed_text(&["b"]), streamed_text(&["c"])],
        events,
    );
    let orchestrator = assert_ok!(
        TaskSplitOrchestrator::builder()
            .planner(planner)
            .executor(executor.clone())
            .max_subtasks(2)
            .build()
    );

    let items = collect(orchestrator.run(vec![Message::user("q")])).await;
    assert!(items.iter().all(Result::is_ok));
    assert_eq!(
        executor.calls(),
        vec![vec![Message::user("A")], vec![Message::user("B")]]
    );
}

#[tokio::test]
async fn test_builder_rejects_missing_agents() {
    let planner = ScriptedAgent::new("planner", vec![], log());
    assert!(TaskSplitOrchestrator::builder().planner(planner.clone()).build().is_err());
    assert!(
        TaskSplitOrchestrator::builder()
            .planner(planner.clone())
            .executor(planner)
            .max_subtasks(0)
            .build()
            .is_err()
    );
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let (planner, _, orchestrator) = aapl_setup();
    let token = CancellationToken::new();
    token.cancel();

    let items = collect(orchestrator.run_with_cancellation(vec![Message::user("q")], token)).await;
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(Error::Cancelled)));
    assert!(planner.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_mid_run() {
    let (_, executor, orchestrator) = aapl_setup();
    let token = CancellationToken::new();
    let mut stream = orchestrator.run_with_cancellation(vec![Message::user("分析AAPL")], token.clone());

    assert_ok!(stream.next().await.unwrap());
    token.cancel();
    assert!(matches!(stream.next().await, Some(Err(Error::Cancelled))));
    assert!(stream.next().await.is_none());
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_caller_transcript_is_preserved() {
    let (planner, _, orchestrator) = aapl_setup();
    let history = vec![
        Message::user("你好"),
        Message::assistant("你好，有什么可以帮您？"),
        Message::user("分析AAPL"),
    ];

    let _ = collect(orchestrator.run(history.clone())).await;

    let seen = &planner.calls()[0];
    assert_eq!(&seen[..2], &history[..2]);
    assert!(matches!(
        &seen[2].content,
        Some(MessageContent::Blocks(blocks)) if blocks.len() == 2
    ));
}

#[tokio::test]
async fn test_process_returns_summary_and_records_run_id() {
    let (_, _, orchestrator) = aapl_setup();
    let mut context = Context::new();

    let answer = assert_ok!(orchestrator.process("分析AAPL".into(), &mut context).await);
    assert_eq!(answer, "AAPL 当前股价 180 美元，2023 财年营收 3833 亿美元。");
    assert!(context.run_id().is_some());
}

/// Deterministic agents so that concurrent runs can share them
struct EchoPlanner;

impl StreamingAgent for EchoPlanner {
    fn name(&self) -> &str {
        "echo-planner"
    }

    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        let question = messages.last().and_then(|m| m.text().map(str::to_string)).unwrap_or_default();
        Box::pin(async_stream::stream! {
            tokio::task::yield_now().await;
            let reply = match question.strip_prefix(SUMMARY_PREFIX) {
                Some(results) => format!("summary[{results}]"),
                None => json!([{"task": format!("{question}-1")}, {"task": format!("{question}-2")}]).to_string(),
            };
            yield Ok(vec![Message::assistant(reply)]);
        })
    }
}

struct EchoExecutor;

impl StreamingAgent for EchoExecutor {
    fn name(&self) -> &str {
        "echo-executor"
    }

    fn run(&self, messages: Vec<Message>) -> SnapshotStream<'_> {
        let task = messages.last().map(Message::full_text).unwrap_or_default();
        Box::pin(async_stream::stream! {
            tokio::task::yield_now().await;
            yield Ok(vec![Message::assistant(format!("done {task}"))]);
        })
    }
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let orchestrator = TaskSplitOrchestrator::new(Arc::new(EchoPlanner), Arc::new(EchoExecutor));

    let (a, b) = futures::join!(
        last_snapshot(orchestrator.run(vec![Message::user("AAPL")])),
        last_snapshot(orchestrator.run(vec![Message::user("TSLA")])),
    );

    assert_eq!(final_text(&assert_ok!(a)), "summary[done AAPL-1\ndone AAPL-2]");
    assert_eq!(final_text(&assert_ok!(b)), "summary[done TSLA-1\ndone TSLA-2]");
}
