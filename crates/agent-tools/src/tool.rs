//! Tool trait definition

use agent_core::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A named capability an agent can invoke.
///
/// Tools receive JSON parameters matching [`input_schema`](Tool::input_schema)
/// and return a JSON value. Data tools report upstream faults as an
/// [`error_payload`](crate::error_payload) in `Ok`; `Err` is reserved for
/// faults of the tool itself.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Unique name within a registry
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema of the parameters
    ///
    /// ```
    /// use serde_json::json;
    ///
    /// let schema = json!({
    ///     "type": "object",
    ///     "properties": {
    ///         "ticker": { "type": "string" },
    ///         "limit": { "type": "integer", "default": 10 }
    ///     },
    ///     "required": ["ticker"]
    /// });
    /// assert_eq!(schema["required"][0], "ticker");
    /// ```
    fn input_schema(&self) -> Value;
}
