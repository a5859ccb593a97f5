//! Stock analysis assistant
//!
//! This crate provides the data tools and the assembly of a task-splitting
//! stock assistant:
//!
//! - US equities from Yahoo Finance, with Finnhub as a news fallback
//! - China A-shares from East Money
//! - Web search through SerpAPI or DuckDuckGo
//! - Technical indicators (MA, RSI, MACD, Bollinger bands, KDJ)
//!
//! # Architecture
//!
//! [`StockAssistant`] wraps a `TaskSplitOrchestrator`. The planner agent
//! splits a question into sub-tasks, the executor agent answers each one by
//! calling the registered tools, and the planner summarizes the results.
//! Tools never fail the agent loop on upstream faults: they answer with an
//! `{"error": ...}` object the model can read.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_llm::providers::OpenAIProvider;
//! use agent_stock::{StockAssistant, StockConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = Arc::new(OpenAIProvider::from_env()?);
//!     let assistant = StockAssistant::builder()
//!         .provider(provider)
//!         .stock_config(Arc::new(StockConfig::from_env()?))
//!         .build()?;
//!
//!     println!("{}", assistant.ask("分析AAPL最近一个月的走势").await?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod indicators;
pub mod prompts;
pub mod symbol;
pub mod tools;

pub use assistant::{ASSISTANT_NAME, StockAssistant, StockAssistantBuilder};
pub use config::{Market, StockConfig, StockConfigBuilder};
pub use error::{Result, StockError};
pub use prompts::Prompts;
pub use symbol::{Exchange, ZhCode};
pub use tools::{WebSearchTool, register_tools};
