//! Tool framework
//!
//! The [`Tool`] capability trait, the [`ToolRegistry`] agents look tools up
//! in, and helpers for the `{"error": ...}` payload convention data tools use
//! to report upstream failures without aborting a run.

pub mod payload;
pub mod registry;
pub mod tool;

pub use payload::{error_message, error_payload, is_error_payload};
pub use registry::ToolRegistry;
pub use tool::Tool;

#[cfg(any(test, feature = "test-util"))]
pub use tool::MockTool;
