//! Structured error types for sqlrelay-core.
//!
//! Uses `thiserror` for composable errors. The binary crate can still wrap
//! everything in `anyhow`; library consumers and the HTTP layer match on
//! these variants to pick response codes.

use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

/// Error taxonomy for transaction and session operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Unknown transaction id (never registered, or already removed)
    #[error("transaction '{id}' not found")]
    NotFound { id: String },

    /// Transaction was already committed, rolled back, or force-expired
    #[error("transaction '{id}' already released")]
    AlreadyReleased { id: String },

    /// Admission ceiling hit; no connection was acquired
    #[error("transaction limit reached ({limit} concurrent transactions)")]
    CapacityExceeded { limit: usize },

    /// Pool could not hand out a connection (exhausted or broken)
    #[error("failed to acquire connection: {reason}")]
    AcquireFailed { reason: String },

    /// The database rejected a statement; message passed through
    #[error("query failed: {message}")]
    QueryFailed { message: String },

    /// Missing or unrecognized session id on a non-initialize request
    #[error("unknown session '{id}'")]
    UnknownSession { id: String },

    /// Configuration error
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = RelayError::AlreadyReleased { id: "tx-1".into() };
        assert_eq!(err.to_string(), "transaction 'tx-1' already released");

        let err = RelayError::CapacityExceeded { limit: 10 };
        assert!(err.to_string().contains("10"));
    }
}
