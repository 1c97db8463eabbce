//! Background expiry monitor.
//!
//! Sweeps the registry on a fixed interval and force-rolls-back any
//! transaction older than the configured timeout. Goes through the same
//! `finalize` as the request path, so a sweep racing an in-flight explicit
//! commit/rollback resolves to exactly one winner. Expiries are
//! fire-and-forget: the only signal is the warn-level event below, never a
//! synchronous response to whoever still holds the id.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::RelayError;
use crate::txn::registry::{FinalizeMode, TransactionRegistry};

/// Spawn the monitor task. Runs until the process exits; the returned
/// handle's `abort()` is the only stop mechanism.
pub fn spawn_monitor(
    registry: TransactionRegistry,
    interval: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            "transaction monitor started"
        );

        loop {
            ticker.tick().await;
            sweep(&registry, timeout).await;
        }
    })
}

async fn sweep(registry: &TransactionRegistry, timeout: Duration) {
    let expired = registry.expired(timeout);
    if expired.is_empty() {
        return;
    }
    tracing::debug!(count = expired.len(), "sweeping expired transactions");

    for (id, age) in expired {
        match registry.finalize(&id, FinalizeMode::Rollback).await {
            Ok(_) => {
                tracing::warn!(
                    transaction_id = %id,
                    age_ms = age.as_millis() as u64,
                    "transaction exceeded timeout; forced rollback"
                );
            }
            // Lost the race to an explicit commit/rollback
            Err(RelayError::NotFound { .. }) | Err(RelayError::AlreadyReleased { .. }) => {
                tracing::debug!(transaction_id = %id, "expired transaction already finalized");
            }
            Err(err) => {
                tracing::error!(
                    transaction_id = %id,
                    error = %err,
                    "forced rollback failed; connection released anyway"
                );
            }
        }
    }
}
