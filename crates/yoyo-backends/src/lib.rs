//! # yoyo-backends
//!
//! The [`base::DatabaseBackend`] trait and the concrete drivers that
//! implement it, plus the [`value`] module's parameter/row types and the
//! [`lock`] module's cross-process locking protocol.
//!
//! Feature-gated drivers:
//! - `sqlite` (default) — [`sqlite::SqliteBackend`], via `rusqlite`
//! - `postgres` — [`postgresql::PostgresBackend`], via `tokio-postgres` +
//!   `deadpool-postgres`
//! - `mysql` — [`mysql::MySqlBackend`], via `mysql_async`

pub mod base;
pub mod lock;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgresql;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod value;

pub use base::{DatabaseBackend, DatabaseConfig, Savepoint, Vendor};
pub use value::{Row, Value};
