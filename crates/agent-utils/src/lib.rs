//! Shared utilities for the stock assistant workspace
//!
//! Logging setup and process-level configuration used by every binary.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
