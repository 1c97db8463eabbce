//! Operation implementations behind the dispatcher.
//!
//! Write transactions flow admission gate → pool acquire → `BEGIN` →
//! statement → registry; reads, DDL, and introspection run on the shared
//! pool and never touch the registry.

use sqlrelay_core::{FinalizeMode, RelayError, WriteConnection, WritePool};

use crate::db::rows_to_json;
use crate::http::error::ApiError;
use crate::rpc::protocol::{ColumnDescription, RpcResponse};
use crate::state::AppState;

/// Begin a bounded write transaction running `sql` as its first statement.
///
/// Admission is checked before the pool is touched; a rejected request
/// costs nothing. On any failure past admission the slot and the connection
/// are both returned (ticket and connection drop).
pub async fn begin_write(state: &AppState, sql: &str) -> Result<RpcResponse, ApiError> {
    let ticket = state.registry().admit()?;
    let mut conn = state.write_pool().acquire().await?;

    conn.execute("BEGIN").await?;
    let rows_affected = match conn.execute(sql).await {
        Ok(n) => n,
        Err(err) => {
            // Hand the connection back clean
            if let Err(rollback_err) = conn.execute("ROLLBACK").await {
                tracing::warn!(
                    error = %rollback_err,
                    "rollback after failed opening statement also failed"
                );
            }
            return Err(err.into());
        }
    };

    let transaction_id = state.registry().begin(ticket, conn);
    tracing::info!(
        transaction_id = %transaction_id,
        rows_affected,
        active = state.registry().count(),
        "write transaction started"
    );
    Ok(RpcResponse::TransactionStarted {
        transaction_id,
        rows_affected,
    })
}

/// Commit or roll back a registered transaction.
pub async fn finalize(
    state: &AppState,
    transaction_id: &str,
    mode: FinalizeMode,
) -> Result<RpcResponse, ApiError> {
    let done = state.registry().finalize(transaction_id, mode).await?;
    tracing::info!(
        transaction_id = %done.id,
        mode = %done.mode,
        active = state.registry().count(),
        "transaction finalized"
    );
    Ok(RpcResponse::TransactionFinalized {
        transaction_id: done.id,
        mode: done.mode.as_str(),
    })
}

/// Read query on the shared pool.
pub async fn read_query(state: &AppState, sql: &str) -> Result<RpcResponse, ApiError> {
    let rows = sqlx::query(sql)
        .fetch_all(state.pool())
        .await
        .map_err(|e| RelayError::QueryFailed {
            message: e.to_string(),
        })?;

    let rows = rows_to_json(&rows);
    let count = rows.len();
    Ok(RpcResponse::Rows { rows, count })
}

/// Autocommit statement (DDL/DCL/TCL, maintenance) on the shared pool.
pub async fn execute(state: &AppState, sql: &str) -> Result<RpcResponse, ApiError> {
    let done = sqlx::query(sql)
        .execute(state.pool())
        .await
        .map_err(|e| RelayError::QueryFailed {
            message: e.to_string(),
        })?;

    Ok(RpcResponse::Executed {
        rows_affected: done.rows_affected(),
    })
}

/// Table names in the public schema.
pub async fn list_tables(state: &AppState) -> Result<RpcResponse, ApiError> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' ORDER BY table_name",
    )
    .fetch_all(state.pool())
    .await
    .map_err(|e| RelayError::QueryFailed {
        message: e.to_string(),
    })?;

    Ok(RpcResponse::Tables { tables })
}

/// Column metadata for one table in the public schema.
pub async fn describe_table(state: &AppState, table: &str) -> Result<RpcResponse, ApiError> {
    let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
        "SELECT column_name, data_type, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name = $1 \
         ORDER BY ordinal_position",
    )
    .bind(table)
    .fetch_all(state.pool())
    .await
    .map_err(|e| RelayError::QueryFailed {
        message: e.to_string(),
    })?;

    if rows.is_empty() {
        return Err(ApiError::NotFound {
            resource: "table",
            id: table.to_string(),
        });
    }

    let columns = rows
        .into_iter()
        .map(|(name, data_type, is_nullable, default)| ColumnDescription {
            name,
            data_type,
            nullable: is_nullable == "YES",
            default,
        })
        .collect();

    Ok(RpcResponse::TableDescription {
        table: table.to_string(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, create_pool_lazy};
    use sqlrelay_core::RelayConfig;

    fn lazy_state(max_concurrent: usize) -> AppState {
        let mut config = RelayConfig::from_env();
        config.max_concurrent_transactions = max_concurrent;
        let pool = create_pool_lazy(&config).expect("valid url");
        AppState::new(config, pool)
    }

    #[tokio::test]
    async fn admission_rejection_is_capacity_exceeded() {
        // Ceiling of zero rejects immediately, before any pool contact
        let state = lazy_state(0);
        let err = begin_write(&state, "INSERT INTO t VALUES (1)")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Relay(RelayError::CapacityExceeded { limit: 0 })
        ));
        assert_eq!(state.registry().count(), 0);
    }

    #[tokio::test]
    async fn finalize_unknown_transaction_is_not_found() {
        let state = lazy_state(5);
        let err = finalize(&state, "no-such-id", FinalizeMode::Commit)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Relay(RelayError::NotFound { .. })));
    }

    // Integration tests require a real database
    // Run with: DATABASE_URL=postgres://... cargo test -p sqlrelay-server

    #[tokio::test]
    #[ignore = "requires database"]
    async fn capacity_scenario_with_real_pool() {
        let mut config = RelayConfig::from_env();
        config.max_concurrent_transactions = 2;
        let pool = create_pool(&config).await.expect("pool creation failed");
        let state = AppState::new(config, pool);

        let a = match begin_write(&state, "SELECT 1").await.unwrap() {
            RpcResponse::TransactionStarted { transaction_id, .. } => transaction_id,
            other => panic!("unexpected: {other:?}"),
        };
        begin_write(&state, "SELECT 1").await.unwrap();
        assert_eq!(state.registry().count(), 2);

        let err = begin_write(&state, "SELECT 1").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Relay(RelayError::CapacityExceeded { .. })
        ));
        assert_eq!(state.registry().count(), 2);

        finalize(&state, &a, FinalizeMode::Commit).await.unwrap();
        assert_eq!(state.registry().count(), 1);
        begin_write(&state, "SELECT 1").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn read_query_returns_rows() {
        let config = RelayConfig::from_env();
        let pool = create_pool(&config).await.expect("pool creation failed");
        let state = AppState::new(config, pool);

        let response = read_query(&state, "SELECT 1 AS one").await.unwrap();
        match response {
            RpcResponse::Rows { rows, count } => {
                assert_eq!(count, 1);
                assert_eq!(rows[0]["one"], serde_json::json!(1));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
