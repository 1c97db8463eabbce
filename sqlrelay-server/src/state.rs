//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;

use sqlrelay_core::{RelayConfig, SessionRegistry, TransactionRegistry, WritePool};

use crate::db::PgWritePool;
use crate::session::SessionHandler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RelayConfig,
    pool: PgPool,
    write_pool: PgWritePool,
    registry: TransactionRegistry,
    sessions: SessionRegistry<SessionHandler>,
}

impl AppState {
    pub fn new(config: RelayConfig, pool: PgPool) -> Self {
        let registry = TransactionRegistry::new(config.max_concurrent_transactions);
        Self {
            inner: Arc::new(AppStateInner {
                write_pool: PgWritePool::new(pool.clone()),
                registry,
                sessions: SessionRegistry::new(),
                config,
                pool,
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Shared pool for reads, DDL, and introspection (bypasses the registry)
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Pool seam the transaction path acquires exclusive connections from
    pub fn write_pool(&self) -> &dyn WritePool {
        &self.inner.write_pool
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.inner.registry
    }

    pub fn sessions(&self) -> &SessionRegistry<SessionHandler> {
        &self.inner.sessions
    }
}
