//! In-memory transaction registry with admission control.
//!
//! Each live write transaction exclusively owns one pooled connection from
//! `begin` until `finalize` (explicit commit/rollback, or a forced rollback
//! from the monitor). Admission is counted here too: a transaction slot is
//! reserved with [`TransactionRegistry::admit`] before the pool is touched,
//! so a rejected request never costs a connection.
//!
//! Concurrency discipline: one `std::sync::Mutex` guards the map and the
//! reservation count. The lock is never held across an `.await`; `finalize`
//! flips the `released` flag and takes the connection under the lock, then
//! issues the terminal statement outside it. A racing finalize for the same
//! id observes `released == true` and loses with `AlreadyReleased`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::error::RelayError;
use crate::pool::WriteConnection;

struct TxnEntry {
    /// Some until finalize takes it; the entry is removed right after the
    /// terminal statement completes
    conn: Option<Box<dyn WriteConnection>>,
    created_at: Instant,
    released: bool,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, TxnEntry>,
    /// Admitted but not yet begun (ticket outstanding)
    reserved: usize,
}

struct Shared {
    state: Mutex<RegistryState>,
    limit: usize,
}

/// Registry of live write transactions. Cheap to clone; all clones share
/// one map.
#[derive(Clone)]
pub struct TransactionRegistry {
    shared: Arc<Shared>,
}

/// Reserved admission slot, consumed by [`TransactionRegistry::begin`].
///
/// Dropping an unconsumed ticket returns the slot, which covers the paths
/// where pool acquisition or the opening statement fails after admission.
pub struct AdmissionTicket {
    shared: Arc<Shared>,
    consumed: bool,
}

impl std::fmt::Debug for AdmissionTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionTicket")
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        if !self.consumed {
            let mut state = self.shared.state.lock().expect("registry lock poisoned");
            state.reserved -= 1;
        }
    }
}

/// Snapshot of one registered transaction.
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub id: String,
    pub age: Duration,
    pub released: bool,
}

/// Which terminal statement a finalize applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeMode {
    Commit,
    Rollback,
}

impl FinalizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeMode::Commit => "commit",
            FinalizeMode::Rollback => "rollback",
        }
    }

    fn statement(&self) -> &'static str {
        match self {
            FinalizeMode::Commit => "COMMIT",
            FinalizeMode::Rollback => "ROLLBACK",
        }
    }
}

impl std::fmt::Display for FinalizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confirmation returned by a successful finalize.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub id: String,
    pub mode: FinalizeMode,
}

impl TransactionRegistry {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RegistryState::default()),
                limit: max_concurrent,
            }),
        }
    }

    /// Reserve an admission slot before any connection is acquired.
    ///
    /// Live transactions plus outstanding tickets count against the ceiling,
    /// so the ceiling holds even while a pool acquire is in flight.
    ///
    /// # Errors
    ///
    /// [`RelayError::CapacityExceeded`] once the ceiling is reached.
    pub fn admit(&self) -> Result<AdmissionTicket, RelayError> {
        let mut state = self.shared.state.lock().expect("registry lock poisoned");
        if state.entries.len() + state.reserved >= self.shared.limit {
            return Err(RelayError::CapacityExceeded {
                limit: self.shared.limit,
            });
        }
        state.reserved += 1;
        Ok(AdmissionTicket {
            shared: Arc::clone(&self.shared),
            consumed: false,
        })
    }

    /// Register a new transaction bound to `conn`, consuming the ticket.
    /// Never fails by itself; returns the fresh transaction id.
    pub fn begin(&self, mut ticket: AdmissionTicket, conn: Box<dyn WriteConnection>) -> String {
        let id = Uuid::new_v4().to_string();
        let mut state = self.shared.state.lock().expect("registry lock poisoned");
        ticket.consumed = true;
        state.reserved -= 1;
        state.entries.insert(
            id.clone(),
            TxnEntry {
                conn: Some(conn),
                created_at: Instant::now(),
                released: false,
            },
        );
        tracing::debug!(transaction_id = %id, active = state.entries.len(), "transaction registered");
        id
    }

    pub fn get(&self, id: &str) -> Option<TransactionInfo> {
        let state = self.shared.state.lock().expect("registry lock poisoned");
        state.entries.get(id).map(|entry| TransactionInfo {
            id: id.to_string(),
            age: entry.created_at.elapsed(),
            released: entry.released,
        })
    }

    pub fn has(&self, id: &str) -> bool {
        let state = self.shared.state.lock().expect("registry lock poisoned");
        state.entries.contains_key(id)
    }

    /// Idempotent; removing an absent id is a no-op.
    pub fn remove(&self, id: &str) {
        let mut state = self.shared.state.lock().expect("registry lock poisoned");
        state.entries.remove(id);
    }

    /// Number of currently tracked transactions (reservations excluded).
    pub fn count(&self) -> usize {
        let state = self.shared.state.lock().expect("registry lock poisoned");
        state.entries.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.limit
    }

    /// Ids and ages of unreleased transactions older than `timeout`.
    pub fn expired(&self, timeout: Duration) -> Vec<(String, Duration)> {
        let state = self.shared.state.lock().expect("registry lock poisoned");
        let now = Instant::now();
        state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.released)
            .filter_map(|(id, entry)| {
                let age = now.duration_since(entry.created_at);
                (age > timeout).then(|| (id.clone(), age))
            })
            .collect()
    }

    /// Finalize a transaction: issue `COMMIT`/`ROLLBACK` on its connection,
    /// release the connection to the pool, drop the entry.
    ///
    /// The request path and the expiry monitor both come through here; the
    /// check-and-set on `released` guarantees exactly one of them wins.
    ///
    /// # Errors
    ///
    /// [`RelayError::NotFound`] for an unknown id,
    /// [`RelayError::AlreadyReleased`] when losing the race (the stale entry
    /// is removed as cleanup), [`RelayError::QueryFailed`] if the terminal
    /// statement is rejected. The connection is released exactly once on
    /// every path.
    pub async fn finalize(&self, id: &str, mode: FinalizeMode) -> Result<Finalized, RelayError> {
        let conn = {
            let mut state = self.shared.state.lock().expect("registry lock poisoned");
            match state.entries.get_mut(id) {
                None => {
                    return Err(RelayError::NotFound { id: id.to_string() });
                }
                Some(entry) if entry.released => {
                    state.entries.remove(id);
                    return Err(RelayError::AlreadyReleased { id: id.to_string() });
                }
                Some(entry) => {
                    entry.released = true;
                    entry.conn.take()
                }
            }
        };

        // conn is Some whenever released was false
        let Some(mut conn) = conn else {
            return Err(RelayError::AlreadyReleased { id: id.to_string() });
        };

        let result = conn.execute(mode.statement()).await;
        self.remove(id);
        drop(conn); // back to the pool

        result?;
        tracing::debug!(transaction_id = %id, mode = %mode, "transaction finalized");
        Ok(Finalized {
            id: id.to_string(),
            mode,
        })
    }
}
