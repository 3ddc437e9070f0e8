//! SQLite database backend using `rusqlite`.
//!
//! This module provides the [`SqliteBackend`] which implements the
//! [`DatabaseBackend`](crate::base::DatabaseBackend) trait using `rusqlite`
//! wrapped in `tokio::task::spawn_blocking` for async compatibility.
//!
//! Features:
//! - WAL mode enabled by default for file-backed databases
//! - In-memory database support via `:memory:` path (used by tests)
//! - Simple `Mutex`-based concurrency control, matching the single-writer
//!   nature of SQLite itself

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use yoyo_core::YoyoError;

use crate::base::{DatabaseBackend, Vendor};
use crate::value::{Row, Value};

/// A SQLite database backend.
pub struct SqliteBackend {
    path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteBackend {
    /// Opens a new SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created. WAL
    /// journal mode is enabled for file-backed databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, YoyoError> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| YoyoError::Connection {
            url: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        if path.to_str() != Some(":memory:") {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
                .map_err(|e| YoyoError::Database(format!("failed to set pragmas: {e}")))?;
        } else {
            conn.execute_batch("PRAGMA foreign_keys=ON;")
                .map_err(|e| YoyoError::Database(format!("failed to set pragmas: {e}")))?;
        }

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (convenience constructor, used in tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> Result<Self, YoyoError> {
        Self::open(":memory:")
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn bind_params(
        stmt: &mut rusqlite::Statement<'_>,
        params: &[Value],
    ) -> Result<(), YoyoError> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::DateTime(dt) => stmt.raw_bind_parameter(idx, dt.to_rfc3339()),
            }
            .map_err(|e| YoyoError::Database(format!("bind error: {e}")))?;
        }
        Ok(())
    }

    fn convert_row(
        sqlite_row: &rusqlite::Row<'_>,
        column_names: &[String],
    ) -> Result<Row, YoyoError> {
        let values: Vec<Value> = column_names
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let val_ref = sqlite_row
                    .get_ref(i)
                    .unwrap_or(rusqlite::types::ValueRef::Null);
                match val_ref {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::String(v.to_string()),
                    rusqlite::types::ValueRef::Text(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                    rusqlite::types::ValueRef::Blob(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                }
            })
            .collect();

        Ok(Row::new(column_names.to_vec(), values))
    }
}

#[async_trait::async_trait]
impl DatabaseBackend for SqliteBackend {
    fn vendor(&self) -> Vendor {
        Vendor::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, YoyoError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| YoyoError::Database(e.to_string()))?;
            Self::bind_params(&mut stmt, &params)?;
            let count = stmt
                .raw_execute()
                .map_err(|e| YoyoError::Database(e.to_string()))?;
            Ok(count as u64)
        })
        .await
        .map_err(|e| YoyoError::Database(format!("task join error: {e}")))?
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, YoyoError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| YoyoError::Database(e.to_string()))?;

            let column_names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            Self::bind_params(&mut stmt, &params)?;

            let mut raw_rows = stmt.raw_query();

            let mut rows = Vec::new();
            while let Some(row) = raw_rows
                .next()
                .map_err(|e| YoyoError::Database(e.to_string()))?
            {
                rows.push(Self::convert_row(row, &column_names)?);
            }

            Ok(rows)
        })
        .await
        .map_err(|e| YoyoError::Database(format!("task join error: {e}")))?
    }

    async fn begin(&self) -> Result<(), YoyoError> {
        self.execute("BEGIN", &[]).await?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), YoyoError> {
        self.execute("COMMIT", &[]).await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), YoyoError> {
        self.execute("ROLLBACK", &[]).await?;
        Ok(())
    }

    fn accepts_multi_statement(&self) -> bool {
        // rusqlite's prepare() only accepts one statement; the loader's
        // `split_statements` tokenizer always runs for SQLite sources.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.vendor(), Vendor::Sqlite);
    }

    #[tokio::test]
    async fn test_sqlite_create_table() {
        let backend = SqliteBackend::memory().unwrap();
        let result = backend
            .execute(
                "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
                &[],
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_query() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[Value::from("Alice"), Value::from(30i64)],
            )
            .await
            .unwrap();

        let rows = backend
            .query("SELECT id, name, age FROM users", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_string("name").unwrap(), "Alice");
        assert_eq!(rows[0].get_int("age").unwrap(), 30);
    }

    #[tokio::test]
    async fn test_sqlite_query_one() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        backend
            .execute(
                "INSERT INTO test (val) VALUES (?)",
                &[Value::from("hello")],
            )
            .await
            .unwrap();

        let row = backend
            .query_one("SELECT val FROM test WHERE id = ?", &[Value::from(1i64)])
            .await
            .unwrap();

        assert_eq!(row.get_string("val").unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_sqlite_query_one_not_found() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();

        let result = backend
            .query_one("SELECT id FROM test WHERE id = ?", &[Value::from(999i64)])
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sqlite_query_one_multiple() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        backend
            .execute("INSERT INTO test (val) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();
        backend
            .execute("INSERT INTO test (val) VALUES (?)", &[Value::from("b")])
            .await
            .unwrap();

        let result = backend.query_one("SELECT val FROM test", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sqlite_null_handling() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute(
                "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, bio TEXT)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute(
                "INSERT INTO test (name, bio) VALUES (?, ?)",
                &[Value::from("Alice"), Value::Null],
            )
            .await
            .unwrap();

        let row = backend
            .query_one(
                "SELECT name, bio FROM test WHERE id = ?",
                &[Value::from(1i64)],
            )
            .await
            .unwrap();

        assert_eq!(row.get_string("name").unwrap(), "Alice");
        assert!(row.get_string("bio").is_err());
    }

    #[tokio::test]
    async fn test_sqlite_multiple_inserts() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
                &[],
            )
            .await
            .unwrap();

        for name in &["Alice", "Bob", "Charlie"] {
            backend
                .execute(
                    "INSERT INTO users (name) VALUES (?)",
                    &[Value::from(*name)],
                )
                .await
                .unwrap();
        }

        let rows = backend
            .query("SELECT name FROM users ORDER BY name", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get_string("name").unwrap(), "Alice");
        assert_eq!(rows[1].get_string("name").unwrap(), "Bob");
        assert_eq!(rows[2].get_string("name").unwrap(), "Charlie");
    }

    #[tokio::test]
    async fn test_sqlite_update_and_delete() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute(
                "INSERT INTO users (name) VALUES (?)",
                &[Value::from("Alice")],
            )
            .await
            .unwrap();

        let affected = backend
            .execute(
                "UPDATE users SET name = ? WHERE id = ?",
                &[Value::from("Alice Updated"), Value::from(1i64)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let affected = backend
            .execute("DELETE FROM users WHERE id = ?", &[Value::from(1i64)])
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = backend.query("SELECT * FROM users", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_transaction_commit() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        backend.begin().await.unwrap();
        backend
            .execute(
                "INSERT INTO test (val) VALUES (?)",
                &[Value::from("hello")],
            )
            .await
            .unwrap();
        backend.commit().await.unwrap();

        let rows = backend.query("SELECT val FROM test", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_transaction_rollback() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        backend.begin().await.unwrap();
        backend
            .execute(
                "INSERT INTO test (val) VALUES (?)",
                &[Value::from("hello")],
            )
            .await
            .unwrap();
        backend.rollback().await.unwrap();

        let rows = backend.query("SELECT val FROM test", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_savepoint_rollback() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        backend.begin().await.unwrap();
        backend
            .execute("INSERT INTO test (val) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();

        let sp = crate::base::Savepoint::numbered(1);
        backend.savepoint(&sp).await.unwrap();
        backend
            .execute("INSERT INTO test (val) VALUES (?)", &[Value::from("b")])
            .await
            .unwrap();
        backend.rollback_to_savepoint(&sp).await.unwrap();
        backend.commit().await.unwrap();

        let rows = backend.query("SELECT val FROM test", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_string("val").unwrap(), "a");
    }

    #[tokio::test]
    async fn test_sqlite_empty_query() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();

        let rows = backend.query("SELECT * FROM test", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_boolean_values() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute(
                "CREATE TABLE flags (id INTEGER PRIMARY KEY, active INTEGER)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute(
                "INSERT INTO flags (active) VALUES (?)",
                &[Value::Bool(true)],
            )
            .await
            .unwrap();

        let row = backend
            .query_one(
                "SELECT active FROM flags WHERE id = ?",
                &[Value::from(1i64)],
            )
            .await
            .unwrap();
        assert!(row.get_bool("active").unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_path() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.path().to_str().unwrap(), ":memory:");
    }

    #[tokio::test]
    async fn test_sqlite_quote_identifier() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.quote_identifier("my table"), "\"my table\"");
    }

    #[tokio::test]
    async fn test_sqlite_placeholder() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.placeholder(1), "?");
        assert_eq!(backend.placeholder(2), "?");
    }
}
