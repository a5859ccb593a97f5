//! Core abstractions shared by every crate in the workspace
//!
//! The text-level [`Agent`] trait, the per-call [`Context`] and the common
//! [`Error`] type.

pub mod agent;
pub mod context;
pub mod error;

pub use agent::Agent;
pub use context::Context;
pub use error::{Error, Result};
