//! sqlrelay-core: transaction lifecycle and session state for sqlrelay
//!
//! The pieces with real invariants live here, free of any HTTP or sqlx
//! surface: the transaction registry (admission counting, begin, finalize),
//! the background expiry monitor, the session registry, and the connection
//! pool contract the server crate implements over sqlx.

pub mod config;
pub mod error;
pub mod pool;
pub mod session;
pub mod txn;

pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use pool::{WriteConnection, WritePool};
pub use session::SessionRegistry;
pub use txn::monitor::spawn_monitor;
pub use txn::registry::{
    AdmissionTicket, FinalizeMode, Finalized, TransactionInfo, TransactionRegistry,
};
