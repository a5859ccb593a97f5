//! Stock analysis assistant on the command line
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! export OPENAI_API_BASE=https://dashscope.aliyuncs.com/compatible-mode/v1
//!
//! # One question
//! stock-assistant --query "分析AAPL最近一个月的走势"
//!
//! # Interactive session, A-share tools only
//! stock-assistant --market zh
//! ```

mod render;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use agent_llm::Message;
use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
use agent_orchestrator::SubTaskFailurePolicy;
use agent_runtime::{SnapshotStream, final_text};
use agent_stock::{Market, StockAssistant, StockConfig, register_tools};
use agent_tools::ToolRegistry;
use agent_utils::LogFormat;
use anyhow::Context as _;
use clap::Parser;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::render::{Progress, tool_table};

#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
#[command(name = "stock-assistant", version)]
#[command(about = "Task-splitting stock analysis assistant", long_about = None)]
struct Args {
    /// Question to answer; starts an interactive session when omitted
    #[arg(short, long)]
    query: Option<String>,

    /// Model used by the planner and the executor
    #[arg(short, long, env = "OPENAI_MODEL", default_value = "qwen-plus")]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Markets whose tools are registered: us, zh or all
    #[arg(long, env = "STOCK_MARKET", default_value_t = Market::All)]
    market: Market,

    /// Execute at most this many sub-tasks per question
    #[arg(long)]
    max_subtasks: Option<usize>,

    /// Keep going when a sub-task fails, recording the failure
    #[arg(long)]
    recover_subtasks: bool,

    /// Do not offer the tool list to the planner
    #[arg(long)]
    no_planner_tools: bool,

    /// Print the registered tools and exit
    #[arg(long)]
    list_tools: bool,

    /// Log output format: text or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let app = agent_utils::Config::from_env()?;
    agent_utils::init_tracing_with(args.log_format.unwrap_or(app.log_format));

    let stock = Arc::new(
        StockConfig::builder()
            .with_env_api_keys()
            .markets(args.market)
            .build()?,
    );

    if args.list_tools {
        let registry = ToolRegistry::new();
        register_tools(&registry, stock)?;
        println!("{}", tool_table(&registry.list_tools()));
        return Ok(());
    }

    let assistant = build_assistant(&args, stock)?;
    info!(app = %app.app_name, model = %args.model, market = %args.market, "stock assistant started");

    match args.query.as_deref() {
        Some(query) => answer(&assistant, query).await,
        None => repl(&assistant).await,
    }
}

fn build_assistant(args: &Args, stock: Arc<StockConfig>) -> anyhow::Result<StockAssistant> {
    let mut llm = OpenAIConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "no API key configured, calling the endpoint without one");
        OpenAIConfig::default()
    });
    if let Some(base) = &args.api_base {
        llm = llm.with_api_base(base.clone());
    }
    let llm = llm.with_model(args.model.clone());
    let provider = Arc::new(OpenAIProvider::with_config(llm).context("creating LLM provider")?);

    let mut builder = StockAssistant::builder()
        .provider(provider)
        .model(args.model.clone())
        .stock_config(stock)
        .planner_tools(!args.no_planner_tools);
    if let Some(max) = args.max_subtasks {
        builder = builder.max_subtasks(max);
    }
    if args.recover_subtasks {
        builder = builder.failure_policy(SubTaskFailurePolicy::Recover);
    }
    Ok(builder.build()?)
}

/// Run one question, printing progress to stderr and the answer to stdout.
///
/// Ctrl-C cancels the run and returns to the caller.
async fn answer(assistant: &StockAssistant, question: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let stream = assistant.run_with_cancellation(vec![Message::user(question)], cancel);
    let outcome = drain(stream).await;
    watcher.abort();

    match outcome? {
        Some(text) if !text.is_empty() => println!("{text}\n"),
        Some(_) => {}
        None => eprintln!("已取消"),
    }
    Ok(())
}

/// Consume a run, printing progress lines to stderr.
///
/// Returns the final text, or `None` when the run was cancelled.
async fn drain(mut stream: SnapshotStream<'_>) -> anyhow::Result<Option<String>> {
    let mut progress = Progress::default();
    let mut last = Vec::new();

    while let Some(snapshot) = stream.next().await {
        match snapshot {
            Ok(snapshot) => {
                for line in progress.advance(&snapshot) {
                    eprintln!("{line}");
                }
                last = snapshot;
            }
            Err(e) if e.is_cancelled() => return Ok(None),
            Err(e) => return Err(anyhow::Error::new(e).context("stock assistant run failed")),
        }
    }
    Ok(Some(final_text(&last)))
}

async fn repl(assistant: &StockAssistant) -> anyhow::Result<()> {
    println!("股票分析助手已就绪，输入问题开始分析，输入 exit 退出。");
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }

        let input = input.trim();
        match input {
            "" => continue,
            "exit" | "quit" | "/exit" => break,
            question => {
                if let Err(e) = answer(assistant, question).await {
                    eprintln!("错误: {e:#}\n");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::Error;
    use futures::stream;

    #[tokio::test]
    async fn test_cancelled_run_has_no_answer() {
        let items: Vec<agent_core::Result<Vec<Message>>> = vec![
            Ok(vec![Message::assistant("[{\"task\": \"A\"}]")]),
            Ok(vec![Message::assistant("[{\"task\": \"A\"}]"), Message::assistant("部分")]),
            Err(Error::Cancelled),
        ];
        assert!(drain(stream::iter(items).boxed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finished_run_returns_final_text() {
        let items: Vec<agent_core::Result<Vec<Message>>> =
            vec![Ok(vec![Message::assistant("计划"), Message::assistant("总结")])];
        let text = drain(stream::iter(items).boxed()).await.unwrap();
        assert_eq!(text.as_deref(), Some("总结"));
    }

    #[tokio::test]
    async fn test_failed_run_is_an_error() {
        let items: Vec<agent_core::Result<Vec<Message>>> = vec![Err(Error::Llm("timeout".into()))];
        assert!(drain(stream::iter(items).boxed()).await.is_err());
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "stock-assistant",
            "--query",
            "分析AAPL",
            "--market",
            "zh",
            "--max-subtasks",
            "3",
            "--recover-subtasks",
            "--no-planner-tools",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.query.as_deref(), Some("分析AAPL"));
        assert_eq!(args.market, Market::Zh);
        assert_eq!(args.max_subtasks, Some(3));
        assert!(args.recover_subtasks);
        assert!(args.no_planner_tools);
        assert!(!args.list_tools);
        assert_eq!(args.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn test_rejects_unknown_market() {
        assert!(Args::try_parse_from(["stock-assistant", "--market", "hk"]).is_err());
    }
}
