//! Transaction lifecycle: registry, admission control, and expiry monitor.

pub mod monitor;
pub mod registry;

pub use monitor::spawn_monitor;
pub use registry::{
    AdmissionTicket, FinalizeMode, Finalized, TransactionInfo, TransactionRegistry,
};
