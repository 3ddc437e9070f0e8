//! # yoyo
//!
//! A database schema-migration engine.
//!
//! This is the meta-crate that re-exports the engine's sub-crates for
//! convenient access. Depend on `yoyo` to get the whole engine, or depend
//! on individual crates (`yoyo-core`, `yoyo-backends`, `yoyo-migrations`,
//! `yoyo-cli`) for finer-grained control.

/// Error types, resolved settings, and logging setup.
pub use yoyo_core as core;

/// Pluggable database backends: `PostgreSQL`, `MySQL`, `SQLite`.
pub use yoyo_backends as backends;

/// Migration graph, planner, and execution engine.
pub use yoyo_migrations as migrations;

/// Command-line front-end (`new`, `list`, `apply`, `rollback`, `reapply`,
/// `develop`, `mark`, `unmark`, `init`, `break-lock`).
#[cfg(feature = "cli")]
pub use yoyo_cli as cli;
