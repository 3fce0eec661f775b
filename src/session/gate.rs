//! Single-fire completion signal
//!
//! The first address to connect wins the session. The gate is a set-once
//! sender, not a queue: later successes are no-ops and never block the
//! signaling task, and the lone waiter receives exactly one wakeup.

use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

/// Signal half of the gate, shared by all dispatch paths
pub struct CompletionGate {
    tx: Mutex<Option<oneshot::Sender<Ipv4Addr>>>,
}

/// Create a gate and the receiver the session waiter blocks on
pub fn completion_gate() -> (CompletionGate, oneshot::Receiver<Ipv4Addr>) {
    let (tx, rx) = oneshot::channel();
    (
        CompletionGate {
            tx: Mutex::new(Some(tx)),
        },
        rx,
    )
}

impl CompletionGate {
    /// Deliver `address` to the waiter. First call wins; later calls and
    /// calls after the waiter has gone away are no-ops.
    pub fn signal(&self, address: Ipv4Addr) {
        let mut slot = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = slot.take() {
            // Send fails only if the waiter already timed out; either way
            // the gate is spent.
            let _ = tx.send(address);
        }
    }

    /// Whether the gate has already fired
    #[cfg(test)]
    fn is_fired(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
