//! PostgreSQL database backend using `tokio-postgres` and `deadpool-postgres`.
//!
//! This module provides the [`PostgresBackend`] which implements the
//! [`DatabaseBackend`](crate::base::DatabaseBackend) trait using connection
//! pooling via `deadpool-postgres`.

use yoyo_core::YoyoError;

use crate::base::{DatabaseBackend, DatabaseConfig, Vendor};
use crate::value::{Row, Value};

/// A PostgreSQL database backend.
///
/// Uses `deadpool-postgres` for connection pooling and `tokio-postgres` for
/// query execution. A migration's `BEGIN`/`COMMIT`/`ROLLBACK` and its step
/// statements must all land on the same physical connection (spec §4.3's
/// transaction-per-migration invariant); `tx_conn` holds the one checked
/// out of the pool by [`Self::begin`] until [`Self::commit`] or
/// [`Self::rollback`] returns it.
pub struct PostgresBackend {
    pool: deadpool_postgres::Pool,
    tx_conn: tokio::sync::Mutex<Option<deadpool_postgres::Client>>,
}

impl PostgresBackend {
    /// Creates a new `PostgresBackend` from a `deadpool-postgres` pool.
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self {
            pool,
            tx_conn: tokio::sync::Mutex::new(None),
        }
    }

    /// Creates a new backend from a [`DatabaseConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, YoyoError> {
        let mut pg_config = deadpool_postgres::Config::new();
        pg_config.dbname = Some(config.name.clone());
        pg_config.host = config.host.clone();
        pg_config.port = config.port;
        pg_config.user = config.user.clone();
        pg_config.password = config.password.clone();

        let pool = pg_config
            .create_pool(
                Some(deadpool_postgres::Runtime::Tokio1),
                tokio_postgres::NoTls,
            )
            .map_err(|e| YoyoError::Connection {
                url: config.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pool,
            tx_conn: tokio::sync::Mutex::new(None),
        })
    }

    fn value_to_sql_params(
        params: &[Value],
    ) -> Vec<Box<dyn tokio_postgres::types::ToSql + Sync + Send>> {
        params
            .iter()
            .map(|v| -> Box<dyn tokio_postgres::types::ToSql + Sync + Send> {
                match v {
                    Value::Null => Box::new(Option::<String>::None),
                    Value::Bool(b) => Box::new(*b),
                    Value::Int(i) => Box::new(*i),
                    Value::String(s) => Box::new(s.clone()),
                    Value::DateTime(dt) => Box::new(*dt),
                }
            })
            .collect()
    }

    fn convert_row(pg_row: &tokio_postgres::Row) -> Row {
        let columns: Vec<String> = pg_row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| {
                use tokio_postgres::types::Type;
                match *col.type_() {
                    Type::BOOL => pg_row
                        .try_get::<_, Option<bool>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, Value::Bool),
                    Type::INT2 => pg_row
                        .try_get::<_, Option<i16>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                    Type::INT4 => pg_row
                        .try_get::<_, Option<i32>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                    Type::INT8 => pg_row
                        .try_get::<_, Option<i64>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, Value::Int),
                    Type::TEXT | Type::VARCHAR | Type::CHAR | Type::NAME => pg_row
                        .try_get::<_, Option<String>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, Value::String),
                    Type::TIMESTAMPTZ => pg_row
                        .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, Value::DateTime),
                    Type::TIMESTAMP => pg_row
                        .try_get::<_, Option<chrono::NaiveDateTime>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, |v| {
                            Value::DateTime(v.and_utc())
                        }),
                    _ => pg_row
                        .try_get::<_, Option<String>>(i)
                        .ok()
                        .flatten()
                        .map_or(Value::Null, Value::String),
                }
            })
            .collect();

        Row::new(columns, values)
    }
}

#[async_trait::async_trait]
impl DatabaseBackend for PostgresBackend {
    fn vendor(&self) -> Vendor {
        Vendor::PostgreSql
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, YoyoError> {
        let sql_params = Self::value_to_sql_params(params);
        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();

        let guard = self.tx_conn.lock().await;
        if let Some(client) = guard.as_ref() {
            return client
                .execute(sql, &param_refs)
                .await
                .map_err(|e| YoyoError::Database(e.to_string()));
        }
        drop(guard);

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| YoyoError::Database(format!("pool error: {e}")))?;

        client
            .execute(sql, &param_refs)
            .await
            .map_err(|e| YoyoError::Database(e.to_string()))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, YoyoError> {
        let sql_params = Self::value_to_sql_params(params);
        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();

        let guard = self.tx_conn.lock().await;
        if let Some(client) = guard.as_ref() {
            let rows = client
                .query(sql, &param_refs)
                .await
                .map_err(|e| YoyoError::Database(e.to_string()))?;
            return Ok(rows.iter().map(Self::convert_row).collect());
        }
        drop(guard);

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| YoyoError::Database(format!("pool error: {e}")))?;

        let rows = client
            .query(sql, &param_refs)
            .await
            .map_err(|e| YoyoError::Database(e.to_string()))?;

        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn begin(&self) -> Result<(), YoyoError> {
        let mut guard = self.tx_conn.lock().await;
        if guard.is_some() {
            return Err(YoyoError::Database(
                "begin called with a transaction already open".to_string(),
            ));
        }

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| YoyoError::Database(format!("pool error: {e}")))?;
        client
            .execute("BEGIN", &[])
            .await
            .map_err(|e| YoyoError::Database(e.to_string()))?;
        *guard = Some(client);
        Ok(())
    }

    async fn commit(&self) -> Result<(), YoyoError> {
        let mut guard = self.tx_conn.lock().await;
        let client = guard.take().ok_or_else(|| {
            YoyoError::Database("commit called with no transaction open".to_string())
        })?;
        client
            .execute("COMMIT", &[])
            .await
            .map_err(|e| YoyoError::Database(e.to_string()))?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), YoyoError> {
        let mut guard = self.tx_conn.lock().await;
        let client = guard.take().ok_or_else(|| {
            YoyoError::Database("rollback called with no transaction open".to_string())
        })?;
        client
            .execute("ROLLBACK", &[])
            .await
            .map_err(|e| YoyoError::Database(e.to_string()))?;
        Ok(())
    }

    async fn set_schema(&self, schema: &str) -> Result<(), YoyoError> {
        self.execute(&format!("SET search_path TO {schema}"), &[])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_sql_params_basic() {
        let params = vec![
            Value::Bool(true),
            Value::Int(42),
            Value::String("hello".to_string()),
        ];
        let sql_params = PostgresBackend::value_to_sql_params(&params);
        assert_eq!(sql_params.len(), 3);
    }

    #[test]
    fn test_value_to_sql_params_null() {
        let params = vec![Value::Null];
        let sql_params = PostgresBackend::value_to_sql_params(&params);
        assert_eq!(sql_params.len(), 1);
    }

    #[test]
    fn test_value_to_sql_params_datetime() {
        let params = vec![Value::DateTime(chrono::Utc::now())];
        let sql_params = PostgresBackend::value_to_sql_params(&params);
        assert_eq!(sql_params.len(), 1);
    }

    #[test]
    fn test_vendor_is_postgresql() {
        let cfg = DatabaseConfig {
            vendor: Vendor::PostgreSql,
            name: "testdb".into(),
            host: Some("localhost".into()),
            port: Some(5432),
            user: Some("user".into()),
            password: Some("pass".into()),
            options: std::collections::HashMap::new(),
        };
        assert_eq!(cfg.vendor, Vendor::PostgreSql);
    }
}
