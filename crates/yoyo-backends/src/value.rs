//! Parameter and result-row value types shared by every backend.
//!
//! Yoyo migrations are mostly raw SQL dispatched verbatim, so this enum is
//! deliberately smaller than a full ORM's value type: it covers exactly
//! what bookkeeping rows (`_yoyo_migration`, `_yoyo_log`, `_yoyo_version`,
//! `yoyo_lock`) and driver-reported query results need.

use std::collections::HashMap;

use yoyo_core::YoyoError;

/// A bound parameter or a column value read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A UTF-8 string.
    String(String),
    /// A UTC timestamp, used for `applied_at_utc`/`created_at_utc`/`ctime`.
    DateTime(chrono::DateTime<chrono::Utc>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Self::DateTime(v)
    }
}

/// A single row returned by [`crate::base::DatabaseBackend::query`].
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<String>,
    values: HashMap<String, Value>,
}

impl Row {
    /// Builds a row from parallel column-name/value vectors.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        let map = columns.iter().cloned().zip(values).collect();
        Self {
            columns,
            values: map,
        }
    }

    /// Returns the column names, in their original order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the raw [`Value`] for a column.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Reads a column as a `String`.
    pub fn get_string(&self, column: &str) -> Result<String, YoyoError> {
        match self.get_value(column) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) | None => Err(YoyoError::Database(format!(
                "column {column:?} is null or missing"
            ))),
            Some(other) => Err(YoyoError::Database(format!(
                "column {column:?} is not a string: {other:?}"
            ))),
        }
    }

    /// Reads a column as an `i64`.
    pub fn get_int(&self, column: &str) -> Result<i64, YoyoError> {
        match self.get_value(column) {
            Some(Value::Int(v)) => Ok(*v),
            Some(Value::Null) | None => Err(YoyoError::Database(format!(
                "column {column:?} is null or missing"
            ))),
            Some(other) => Err(YoyoError::Database(format!(
                "column {column:?} is not an int: {other:?}"
            ))),
        }
    }

    /// Reads a column as a `bool`.
    pub fn get_bool(&self, column: &str) -> Result<bool, YoyoError> {
        match self.get_value(column) {
            Some(Value::Bool(v)) => Ok(*v),
            Some(Value::Int(v)) => Ok(*v != 0),
            Some(Value::Null) | None => Err(YoyoError::Database(format!(
                "column {column:?} is null or missing"
            ))),
            Some(other) => Err(YoyoError::Database(format!(
                "column {column:?} is not a bool: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get_string() {
        let row = Row::new(
            vec!["name".into()],
            vec![Value::String("alice".into())],
        );
        assert_eq!(row.get_string("name").unwrap(), "alice");
    }

    #[test]
    fn test_row_get_missing_column() {
        let row = Row::new(vec![], vec![]);
        assert!(row.get_string("missing").is_err());
    }

    #[test]
    fn test_row_get_bool_from_int() {
        let row = Row::new(vec!["locked".into()], vec![Value::Int(1)]);
        assert!(row.get_bool("locked").unwrap());
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(Value::from(5i64), Value::Int(5));
        assert_eq!(Value::from(true), Value::Bool(true));
    }
}
