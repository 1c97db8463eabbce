//! Connection pool contract consumed by the transaction core.
//!
//! The server crate implements these traits over sqlx. Keeping the seam here
//! lets the registry and monitor be exercised without a live database.
//!
//! Release is ownership: dropping a [`WriteConnection`] returns the physical
//! connection to the pool, so exactly-once release falls out of the type
//! system rather than a bookkeeping flag.

use async_trait::async_trait;

use crate::error::RelayError;

/// A pooled connection exclusively owned by one write transaction.
#[async_trait]
pub trait WriteConnection: Send + 'static {
    /// Execute a single statement, returning rows affected.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::QueryFailed`] with the database's message.
    async fn execute(&mut self, sql: &str) -> Result<u64, RelayError>;
}

/// Hands out exclusively-owned connections for write transactions.
///
/// Both methods on the underlying pool must be safe to call concurrently;
/// `acquire` fails fast rather than queueing indefinitely.
#[async_trait]
pub trait WritePool: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns [`RelayError::AcquireFailed`] when the pool is exhausted or
    /// the connection is broken.
    async fn acquire(&self) -> Result<Box<dyn WriteConnection>, RelayError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory pool fake for registry and monitor tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{WriteConnection, WritePool};
    use crate::error::RelayError;

    #[derive(Default)]
    struct FakePoolInner {
        available: AtomicUsize,
        acquire_calls: AtomicUsize,
        /// Every statement executed on any connection, in order
        statements: Mutex<Vec<String>>,
        /// When set, the next statement on any connection fails
        fail_next_statement: AtomicUsize,
    }

    #[derive(Clone, Default)]
    pub struct FakePool {
        inner: Arc<FakePoolInner>,
    }

    impl FakePool {
        pub fn with_capacity(capacity: usize) -> Self {
            let pool = Self::default();
            pool.inner.available.store(capacity, Ordering::SeqCst);
            pool
        }

        pub fn available(&self) -> usize {
            self.inner.available.load(Ordering::SeqCst)
        }

        pub fn acquire_calls(&self) -> usize {
            self.inner.acquire_calls.load(Ordering::SeqCst)
        }

        pub fn statements(&self) -> Vec<String> {
            self.inner.statements.lock().unwrap().clone()
        }

        pub fn fail_next_statement(&self) {
            self.inner.fail_next_statement.store(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl WritePool for FakePool {
        async fn acquire(&self) -> Result<Box<dyn WriteConnection>, RelayError> {
            self.inner.acquire_calls.fetch_add(1, Ordering::SeqCst);
            let mut available = self.inner.available.load(Ordering::SeqCst);
            loop {
                if available == 0 {
                    return Err(RelayError::AcquireFailed {
                        reason: "pool exhausted".into(),
                    });
                }
                match self.inner.available.compare_exchange(
                    available,
                    available - 1,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    Ok(_) => break,
                    Err(current) => available = current,
                }
            }
            Ok(Box::new(FakeConnection {
                inner: Arc::clone(&self.inner),
            }))
        }
    }

    pub struct FakeConnection {
        inner: Arc<FakePoolInner>,
    }

    #[async_trait]
    impl WriteConnection for FakeConnection {
        async fn execute(&mut self, sql: &str) -> Result<u64, RelayError> {
            if self.inner.fail_next_statement.swap(0, Ordering::SeqCst) == 1 {
                return Err(RelayError::QueryFailed {
                    message: format!("forced failure: {sql}"),
                });
            }
            self.inner.statements.lock().unwrap().push(sql.to_string());
            Ok(1)
        }
    }

    impl Drop for FakeConnection {
        fn drop(&mut self) {
            self.inner.available.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn acquire_and_drop_track_availability() {
        let pool = FakePool::with_capacity(1);
        let conn = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        // Exhausted pool fails fast
        assert!(matches!(
            pool.acquire().await,
            Err(RelayError::AcquireFailed { .. })
        ));

        drop(conn);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.acquire_calls(), 2);
    }
}
