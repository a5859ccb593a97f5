//! Core Agent trait definition

use crate::{Context, Result};
use async_trait::async_trait;

/// Text-in, text-out agent.
///
/// This is the blocking-style face of an agent: it runs to completion and
/// returns the final answer. Streaming agents in `agent-runtime` implement it
/// as well, so callers that only want the final text can stay simple.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Run to completion over `input` and return the final text
    async fn process(&self, input: String, context: &mut Context) -> Result<String>;

    /// Agent name, used in logs
    fn name(&self) -> &str;
}
