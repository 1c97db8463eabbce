//! Database connection pool management and row decoding.
//!
//! Uses sqlx PgPool with explicit connection limits and a fail-fast acquire
//! timeout, and implements the core's `WritePool` contract over it so write
//! transactions own their connection for their whole lifetime.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};

use sqlrelay_core::{RelayConfig, RelayError, WriteConnection, WritePool};

/// Create a PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the initial connection fails.
pub async fn create_pool(config: &RelayConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.database_url)
        .await
}

/// Create a pool without connecting. Connections are established on first
/// use; handy for tests that never touch the database.
///
/// # Errors
///
/// Fails only on an unparseable connection string.
pub fn create_pool_lazy(config: &RelayConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_lazy(&config.database_url)
}

/// `WritePool` over sqlx: acquire hands out an exclusively-owned pooled
/// connection; dropping it returns the physical connection to the pool.
#[derive(Clone)]
pub struct PgWritePool {
    pool: PgPool,
}

impl PgWritePool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WritePool for PgWritePool {
    async fn acquire(&self) -> Result<Box<dyn WriteConnection>, RelayError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RelayError::AcquireFailed {
                reason: e.to_string(),
            })?;
        Ok(Box::new(PgWriteConnection { conn }))
    }
}

struct PgWriteConnection {
    conn: sqlx::pool::PoolConnection<sqlx::Postgres>,
}

#[async_trait]
impl WriteConnection for PgWriteConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64, RelayError> {
        sqlx::query(sql)
            .execute(self.conn.as_mut())
            .await
            .map(|done| done.rows_affected())
            .map_err(|e| RelayError::QueryFailed {
                message: e.to_string(),
            })
    }
}

/// Convert fetched rows to JSON objects, column by column.
pub fn rows_to_json(rows: &[PgRow]) -> Vec<Value> {
    rows.iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (index, column) in row.columns().iter().enumerate() {
                object.insert(column.name().to_string(), column_value(row, index));
            }
            Value::Object(object)
        })
        .collect()
}

/// Best-effort decode of one column into JSON. Unknown types fall back to
/// their text representation, then to null.
fn column_value(row: &PgRow, index: usize) -> Value {
    let type_name = row.columns()[index].type_info().name();
    match type_name {
        "BOOL" => decode(row.try_get::<Option<bool>, _>(index)),
        "INT2" => decode(row.try_get::<Option<i16>, _>(index).map(|v| v.map(i64::from))),
        "INT4" => decode(row.try_get::<Option<i32>, _>(index).map(|v| v.map(i64::from))),
        "INT8" => decode(row.try_get::<Option<i64>, _>(index)),
        "FLOAT4" => decode(row.try_get::<Option<f32>, _>(index).map(|v| v.map(f64::from))),
        "FLOAT8" => decode(row.try_get::<Option<f64>, _>(index)),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            decode(row.try_get::<Option<String>, _>(index))
        }
        "UUID" => decode(
            row.try_get::<Option<uuid::Uuid>, _>(index)
                .map(|v| v.map(|u| u.to_string())),
        ),
        "JSON" | "JSONB" => match row.try_get::<Option<Value>, _>(index) {
            Ok(Some(value)) => value,
            _ => Value::Null,
        },
        "TIMESTAMPTZ" => decode(
            row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
                .map(|v| v.map(|ts| ts.to_rfc3339())),
        ),
        "TIMESTAMP" => decode(
            row.try_get::<Option<chrono::NaiveDateTime>, _>(index)
                .map(|v| v.map(|ts| ts.to_string())),
        ),
        "DATE" => decode(
            row.try_get::<Option<chrono::NaiveDate>, _>(index)
                .map(|v| v.map(|d| d.to_string())),
        ),
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(Some(text)) => json!(text),
            Ok(None) => Value::Null,
            Err(_) => Value::Null,
        },
    }
}

fn decode<T: serde::Serialize>(result: Result<Option<T>, sqlx::Error>) -> Value {
    match result {
        Ok(Some(value)) => json!(value),
        Ok(None) => Value::Null,
        Err(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrelay_core::FinalizeMode;
    use sqlrelay_core::TransactionRegistry;

    // Integration tests require a real database
    // Run with: DATABASE_URL=postgres://... cargo test -p sqlrelay-server

    fn test_config() -> RelayConfig {
        let mut config = RelayConfig::from_env();
        config.max_connections = 5;
        config
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pool_acquires_connection() {
        let pool = create_pool(&test_config()).await.expect("pool creation failed");

        let result: (i32,) = sqlx::query_as("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("query failed");

        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn write_transaction_round_trip() {
        let pool = create_pool(&test_config()).await.expect("pool creation failed");
        let write_pool = PgWritePool::new(pool);
        let registry = TransactionRegistry::new(5);

        let ticket = registry.admit().unwrap();
        let mut conn = write_pool.acquire().await.unwrap();
        conn.execute("BEGIN").await.unwrap();
        conn.execute("CREATE TEMPORARY TABLE relay_smoke (n int)")
            .await
            .unwrap();
        let id = registry.begin(ticket, conn);

        let done = registry.finalize(&id, FinalizeMode::Rollback).await.unwrap();
        assert_eq!(done.mode, FinalizeMode::Rollback);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn rows_decode_common_types() {
        let pool = create_pool(&test_config()).await.expect("pool creation failed");
        let rows = sqlx::query("SELECT 42 AS n, 'hi' AS s, true AS b, NULL::text AS missing")
            .fetch_all(&pool)
            .await
            .expect("query failed");

        let decoded = rows_to_json(&rows);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0]["n"], json!(42));
        assert_eq!(decoded[0]["s"], json!("hi"));
        assert_eq!(decoded[0]["b"], json!(true));
        assert_eq!(decoded[0]["missing"], Value::Null);
    }
}
