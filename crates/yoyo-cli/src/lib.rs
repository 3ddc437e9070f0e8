//! # yoyo-cli
//!
//! Command-line front-end for yoyo: argument parsing, settings resolution,
//! and the ten-command surface (`new`, `list`, `apply`, `rollback`,
//! `reapply`, `develop`, `mark`, `unmark`, `init`, `break-lock`), built on
//! the same `ManagementCommand`/`CommandRegistry` pattern as the teacher's
//! management-command framework.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use yoyo_cli::command::CommandRegistry;
//! use yoyo_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"apply"));
//! assert!(names.contains(&"rollback"));
//! ```

// These clippy lints are intentionally allowed:
// - result_large_err: YoyoError is the framework-wide error type
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: some functions may gain runtime logic later
// - module_name_repetitions: re-exports make module-prefixed names redundant
// - unused_async: command handlers maintain consistent async signatures
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;
pub mod config;
pub mod support;

pub use command::{CommandRegistry, ManagementCommand};
pub use config::resolve_settings;
