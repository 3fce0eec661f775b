//! Session orchestration
//!
//! Wires the discovery feed, the correlator, the pairing actions, and the
//! completion gate together. Advertisement events arrive serialized over a
//! channel and are handled by one dispatcher task; the state table sits
//! behind a mutex shared with the top-level waiter. The lock is released
//! while an external action runs; the `Pairing`/`Connecting` phases set by
//! the pure transitions keep duplicate events from re-triggering actions
//! in the meantime.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::adb::PairingActions;
use crate::common::prelude::*;
use crate::core::{parse_advertisement, Advertisement, DeviceState, DeviceStateTable, SERVICE_TYPES};

use super::gate::{completion_gate, CompletionGate};
use super::SessionConfig;

/// Abstract advertisement source.
///
/// The session never browses the network itself; it consumes whatever feed
/// it is handed. The real feed is [`crate::mdns::MdnsFeed`]; tests inject
/// scripted ones.
pub trait DiscoveryFeed {
    /// Begin browsing for the given service types. Raw advertisements are
    /// delivered on the returned channel until [`DiscoveryFeed::stop`] is
    /// called.
    fn start(&mut self, service_types: &[&str]) -> Result<mpsc::Receiver<Advertisement>>;

    /// Tear down browsing and release network resources. The channel from
    /// `start` closes once any in-flight event has been forwarded.
    fn stop(&mut self);
}

/// One recorded per-address failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    pub address: Ipv4Addr,
    pub error: String,
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// A device paired and connected before the deadline
    Connected { address: Ipv4Addr },
    /// The deadline passed and at least one address failed with a recorded
    /// diagnostic
    Failed { failures: Vec<DeviceFailure> },
    /// The deadline passed without any address making enough progress to
    /// fail explicitly
    TimedOut,
}

/// One bounded discover-pair-connect attempt
pub struct Session<A> {
    config: SessionConfig,
    actions: Arc<A>,
    table: Arc<Mutex<DeviceStateTable>>,
}

impl<A> Session<A>
where
    A: PairingActions + Send + Sync + 'static,
{
    pub fn new(config: SessionConfig, actions: A) -> Self {
        Self {
            config,
            actions: Arc::new(actions),
            table: Arc::new(Mutex::new(DeviceStateTable::new())),
        }
    }

    /// Run the session to completion: start discovery, wait on the gate up
    /// to the configured timeout, tear discovery down, report.
    pub async fn run<F: DiscoveryFeed>(&self, feed: &mut F) -> Result<SessionOutcome> {
        let events = feed.start(SERVICE_TYPES)?;
        let (gate, fired) = completion_gate();

        let dispatcher = tokio::spawn(dispatch_events(
            events,
            Arc::clone(&self.table),
            Arc::clone(&self.actions),
            self.config.secret.clone(),
            Arc::new(gate),
        ));

        let outcome = match timeout(self.config.timeout, fired).await {
            Ok(Ok(signaled)) => {
                // The gate carries the first winner; the table is
                // authoritative if more addresses connected concurrently
                let address = lock(&self.table).connected_address().unwrap_or(signaled);
                info!(address = %address, "device connected");
                SessionOutcome::Connected { address }
            }
            Ok(Err(_)) => {
                // Feed closed without a success; classify like a timeout
                warn!("discovery feed closed before any device connected");
                self.teardown_outcome()
            }
            Err(_) => {
                warn!(timeout = ?self.config.timeout, "session timed out");
                self.teardown_outcome()
            }
        };

        feed.stop();
        // The dispatcher drains on its own once the feed channel closes. An
        // in-flight pair/connect may still finish and update the table after
        // we return; that late update is tolerated and simply unobserved.
        drop(dispatcher);

        Ok(outcome)
    }

    /// Final per-address states, sorted by address. Meaningful once `run`
    /// has returned.
    pub fn snapshot(&self) -> Vec<(Ipv4Addr, DeviceState)> {
        lock(&self.table).snapshot()
    }

    fn teardown_outcome(&self) -> SessionOutcome {
        let failures: Vec<DeviceFailure> = lock(&self.table)
            .failures()
            .into_iter()
            .map(|(address, error)| DeviceFailure { address, error })
            .collect();

        if failures.is_empty() {
            SessionOutcome::TimedOut
        } else {
            SessionOutcome::Failed { failures }
        }
    }
}

fn lock(table: &Mutex<DeviceStateTable>) -> MutexGuard<'_, DeviceStateTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle advertisement events until the feed channel closes.
///
/// Events for all addresses are serialized through this task, which is the
/// global-lock variant the low discovery rate allows. The pair and connect
/// calls block only this task, bounded by adb's own timeout.
async fn dispatch_events<A>(
    mut events: mpsc::Receiver<Advertisement>,
    table: Arc<Mutex<DeviceStateTable>>,
    actions: Arc<A>,
    secret: String,
    gate: Arc<CompletionGate>,
) where
    A: PairingActions + Send + Sync,
{
    while let Some(raw) = events.recv().await {
        let Some(record) = parse_advertisement(&raw) else {
            trace!(service_type = %raw.service_type, "ignoring advertisement");
            continue;
        };
        debug!(
            kind = ?record.kind,
            address = %record.address,
            port = record.port,
            "service advertisement"
        );

        let Some(attempt) = lock(&table).observe(record) else {
            continue;
        };

        info!(address = %attempt.address, "both services discovered, pairing");
        let pair = actions
            .pair(attempt.address, attempt.pairing_port, &secret)
            .await;
        if !pair.success {
            lock(&table).mark_failed(
                attempt.address,
                format!("pair failed: {}", pair.diagnostic()),
            );
            continue;
        }
        lock(&table).mark_paired(attempt.address);

        info!(
            address = %attempt.address,
            port = attempt.connect_port,
            "paired, connecting"
        );
        lock(&table).begin_connect(attempt.address);
        let connect = actions.connect(attempt.address, attempt.connect_port).await;
        if connect.success {
            lock(&table).mark_connected(attempt.address);
            gate.signal(attempt.address);
        } else {
            lock(&table).mark_failed(
                attempt.address,
                format!("connect failed: {}", connect.diagnostic()),
            );
        }
    }
    trace!("discovery feed closed, dispatcher exiting");
}
