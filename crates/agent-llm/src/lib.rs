//! LLM provider abstraction layer
//!
//! Provider-agnostic message, completion and tool-definition types plus the
//! [`LLMProvider`] trait. Concrete providers live behind feature flags in
//! [`providers`].

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod tools;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, ImageSource, Message, MessageContent, Role};
pub use provider::LLMProvider;
pub use tools::ToolDefinition;

#[cfg(any(test, feature = "test-util"))]
pub use provider::MockLLMProvider;

#[cfg(feature = "openai")]
pub mod providers;
