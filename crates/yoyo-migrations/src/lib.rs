//! # yoyo-migrations
//!
//! The migration graph, source loader, planner, and execution engine (spec
//! §4.1-4.3). Data flows `loader -> migration::MigrationGraph -> planner ->
//! executor`, against any [`yoyo_backends::DatabaseBackend`].
//!
//! ## Module overview
//!
//! - [`migration`] - `Migration`, `Step`, `Payload`, `MigrationGraph`
//! - [`loader`] - `MigrationLoader`, SQL tokenizing, directive parsing
//! - [`rhai_script`] - a Rhai-backed `CodeScriptProvider`
//! - [`planner`] - `to_apply`, `to_rollback`, `reapply`, `develop`, `mark`/`unmark`
//! - [`executor`] - `Executor`, bookkeeping schema, lock-scoped plan execution

#![allow(clippy::too_many_lines)]
#![allow(clippy::result_large_err)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod executor;
pub mod loader;
pub mod migration;
pub mod planner;
pub mod rhai_script;

pub use executor::{Actor, Executor};
pub use loader::{CodeScriptProvider, CodeScriptResult, MigrationLoader, NullPackageResolver, PackageResolver};
pub use migration::{Direction, GhostVertex, IgnoreErrors, Migration, MigrationGraph, MigrationKind, Payload, Step, StepCallable};
pub use planner::{AppliedSet, Plan, PlanDirection, PlanStep};
pub use rhai_script::RhaiScriptProvider;
