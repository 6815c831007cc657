//! # `status_tracker`
//!
//! Hierarchical task tracking for agents: tasks made of phases made of todos, with
//! progress and status derived bottom-up, a completion guard, an audit trail of
//! comments, and reminders for tasks that have gone quiet.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod notifier;
pub mod paths;
pub mod tasks;
pub mod testing;
pub mod traits;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
