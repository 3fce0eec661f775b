//! Per-device pairing state and the shared state table

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Serialize;

use super::record::ServiceRecord;

/// Where an address currently sits in the pairing lifecycle.
///
/// `Failed` is absorbing for the address: no retry is attempted, but the
/// session keeps processing other addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePhase {
    /// Only one of the two service kinds has been seen
    PartiallyDiscovered,
    /// Both kinds seen; pairing not yet started
    BothDiscovered,
    /// `adb pair` is in flight
    Pairing,
    /// Pairing succeeded
    Paired,
    /// `adb connect` is in flight
    Connecting,
    /// Device is connected; the session can finish
    Connected,
    /// Pair or connect failed; see `last_error`
    Failed,
}

/// Mutable per-address record. One per distinct device address, created
/// lazily on the first advertisement and kept for the whole session.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceState {
    /// Last-seen pairing-kind record (latest advertisement is authoritative)
    pub pairing_record: Option<ServiceRecord>,
    /// Last-seen connect-kind record
    pub connect_record: Option<ServiceRecord>,
    /// True once a pair action has succeeded; never reset
    pub paired: bool,
    /// True once a connect action has succeeded. Implies `paired`.
    pub connected: bool,
    /// Diagnostic from the most recent failed action
    pub last_error: Option<String>,
    pub phase: DevicePhase,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            pairing_record: None,
            connect_record: None,
            paired: false,
            connected: false,
            last_error: None,
            phase: DevicePhase::PartiallyDiscovered,
        }
    }
}

impl DeviceState {
    /// Whether pairing may still be triggered for this address
    pub fn in_discovery(&self) -> bool {
        matches!(
            self.phase,
            DevicePhase::PartiallyDiscovered | DevicePhase::BothDiscovered
        )
    }
}

/// Mapping from device address to its pairing state.
///
/// This is the only state shared between the event dispatcher and the
/// session waiter; the session layer wraps it in a mutex. Entries
/// accumulate for the lifetime of the session and are never removed.
#[derive(Debug, Default)]
pub struct DeviceStateTable {
    entries: HashMap<Ipv4Addr, DeviceState>,
}

impl DeviceStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `address`, inserting a fresh one if absent
    pub fn get_or_create(&mut self, address: Ipv4Addr) -> &mut DeviceState {
        self.entries.entry(address).or_default()
    }

    pub fn get(&self, address: Ipv4Addr) -> Option<&DeviceState> {
        self.entries.get(&address)
    }

    pub fn get_mut(&mut self, address: Ipv4Addr) -> Option<&mut DeviceState> {
        self.entries.get_mut(&address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First address that reached `Connected`, if any
    pub fn connected_address(&self) -> Option<Ipv4Addr> {
        self.entries
            .iter()
            .find(|(_, state)| state.connected)
            .map(|(addr, _)| *addr)
    }

    /// All recorded per-address failures, sorted by address for stable output
    pub fn failures(&self) -> Vec<(Ipv4Addr, String)> {
        let mut failures: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(addr, state)| {
                state.last_error.as_ref().map(|err| (*addr, err.clone()))
            })
            .collect();
        failures.sort_by_key(|(addr, _)| *addr);
        failures
    }

    /// Final-state inspection at session teardown, sorted by address.
    ///
    /// Called only after discovery has been torn down, so there are no
    /// concurrent writers racing this pass.
    pub fn snapshot(&self) -> Vec<(Ipv4Addr, DeviceState)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(addr, state)| (*addr, state.clone()))
            .collect();
        entries.sort_by_key(|(addr, _)| *addr);
        entries
    }
}
