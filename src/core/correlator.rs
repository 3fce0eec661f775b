//! Pure state transitions for the discovery correlator
//!
//! Each incoming record is applied to the table with [`DeviceStateTable::observe`],
//! which returns a [`PairAttempt`] plan exactly once per address: the first
//! time both service kinds are present and no attempt has been made. The
//! caller executes the plan and feeds the result back through the `mark_*`
//! methods. Keeping these transitions free of I/O and locks lets the tests
//! drive every ordering directly.

use std::net::Ipv4Addr;

use crate::common::prelude::*;

use super::record::{ServiceKind, ServiceRecord};
use super::state::{DevicePhase, DeviceState, DeviceStateTable};

/// Plan emitted when an address becomes eligible for pairing.
///
/// Ports are captured at trigger time; later advertisements for the same
/// address do not change an attempt already in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairAttempt {
    pub address: Ipv4Addr,
    /// Port from the pairing-kind record
    pub pairing_port: u16,
    /// Port from the connect-kind record
    pub connect_port: u16,
}

impl DeviceState {
    /// Store a record in its kind slot. Re-sent advertisements overwrite;
    /// the latest one is authoritative.
    fn store(&mut self, record: ServiceRecord) {
        match record.kind {
            ServiceKind::Pairing => self.pairing_record = Some(record),
            ServiceKind::Connect => self.connect_record = Some(record),
        }
        if self.in_discovery() {
            self.phase = if self.pairing_record.is_some() && self.connect_record.is_some() {
                DevicePhase::BothDiscovered
            } else {
                DevicePhase::PartiallyDiscovered
            };
        }
    }
}

impl DeviceStateTable {
    /// Apply one record and decide whether to start pairing.
    ///
    /// Returns `Some` at most once per address for the lifetime of the
    /// table: the transition into `Pairing` happens here, so duplicate or
    /// racing records observed afterwards are absorbed as plain record
    /// updates.
    pub fn observe(&mut self, record: ServiceRecord) -> Option<PairAttempt> {
        let address = record.address;
        let state = self.get_or_create(address);
        state.store(record);

        if state.phase != DevicePhase::BothDiscovered {
            return None;
        }

        match (&state.pairing_record, &state.connect_record) {
            (Some(pairing), Some(connect)) => {
                state.phase = DevicePhase::Pairing;
                Some(PairAttempt {
                    address,
                    pairing_port: pairing.port,
                    connect_port: connect.port,
                })
            }
            // Unreachable given the phase check, but never panic here
            _ => None,
        }
    }

    /// Record a successful pair action. `paired` transitions false to true
    /// at most once and is never reset.
    pub fn mark_paired(&mut self, address: Ipv4Addr) {
        if let Some(state) = self.get_mut(address) {
            state.paired = true;
            state.phase = DevicePhase::Paired;
        }
    }

    /// Record that the connect action is starting
    pub fn begin_connect(&mut self, address: Ipv4Addr) {
        if let Some(state) = self.get_mut(address) {
            state.phase = DevicePhase::Connecting;
        }
    }

    /// Record a successful connect action
    pub fn mark_connected(&mut self, address: Ipv4Addr) {
        if let Some(state) = self.get_mut(address) {
            state.connected = true;
            state.phase = DevicePhase::Connected;
        }
    }

    /// Record an action failure. The address stays in `Failed` for the rest
    /// of the session; no retry.
    pub fn mark_failed(&mut self, address: Ipv4Addr, error: impl Into<String>) {
        if let Some(state) = self.get_mut(address) {
            let error = error.into();
            warn!(address = %address, error = %error, "device failed");
            state.last_error = Some(error);
            state.phase = DevicePhase::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Ipv4Addr {
        Ipv4Addr::new(9, 9, 9, 9)
    }

    fn pairing_record(port: u16) -> ServiceRecord {
        ServiceRecord {
            name: "adb-pairing".to_string(),
            kind: ServiceKind::Pairing,
            address: addr(),
            port,
        }
    }

    fn connect_record(port: u16) -> ServiceRecord {
        ServiceRecord {
            name: "adb-connect".to_string(),
            kind: ServiceKind::Connect,
            address: addr(),
            port,
        }
    }

    #[test]
    fn test_single_record_does_not_trigger() {
        let mut table = DeviceStateTable::new();
        assert_eq!(table.observe(pairing_record(1)), None);
        assert_eq!(
            table.get(addr()).unwrap().phase,
            DevicePhase::PartiallyDiscovered
        );
    }

    #[test]
    fn test_both_records_trigger_pairing() {
        let mut table = DeviceStateTable::new();
        assert_eq!(table.observe(pairing_record(1)), None);
        let attempt = table.observe(connect_record(2)).unwrap();

        assert_eq!(attempt.address, addr());
        assert_eq!(attempt.pairing_port, 1);
        assert_eq!(attempt.connect_port, 2);
        assert_eq!(table.get(addr()).unwrap().phase, DevicePhase::Pairing);
    }

    #[test]
    fn test_reordered_records_trigger_identically() {
        let mut table = DeviceStateTable::new();
        assert_eq!(table.observe(connect_record(2)), None);
        let attempt = table.observe(pairing_record(1)).unwrap();

        assert_eq!(attempt.pairing_port, 1);
        assert_eq!(attempt.connect_port, 2);
    }

    #[test]
    fn test_pair_triggered_at_most_once() {
        let mut table = DeviceStateTable::new();
        table.observe(pairing_record(1));
        assert!(table.observe(connect_record(2)).is_some());

        // Replays of either kind are absorbed, in every later phase
        assert!(table.observe(pairing_record(1)).is_none());
        assert!(table.observe(connect_record(2)).is_none());

        table.mark_paired(addr());
        assert!(table.observe(pairing_record(1)).is_none());

        table.mark_connected(addr());
        assert!(table.observe(connect_record(2)).is_none());
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut table = DeviceStateTable::new();
        table.observe(pairing_record(1));
        table.observe(connect_record(2));
        table.mark_failed(addr(), "pair failed: code rejected");

        // Fresh advertisements never resurrect a failed address
        assert!(table.observe(pairing_record(7)).is_none());
        assert!(table.observe(connect_record(8)).is_none());

        let state = table.get(addr()).unwrap();
        assert_eq!(state.phase, DevicePhase::Failed);
        assert_eq!(
            state.last_error.as_deref(),
            Some("pair failed: code rejected")
        );
    }

    #[test]
    fn test_latest_record_of_same_kind_wins() {
        let mut table = DeviceStateTable::new();
        table.observe(pairing_record(1));
        table.observe(pairing_record(5));

        let attempt = table.observe(connect_record(2)).unwrap();
        assert_eq!(attempt.pairing_port, 5);
    }

    #[test]
    fn test_duplicate_replay_leaves_state_unchanged() {
        let mut table = DeviceStateTable::new();
        table.observe(pairing_record(1));
        table.observe(connect_record(2));
        table.mark_paired(addr());
        table.begin_connect(addr());
        table.mark_connected(addr());

        let before = table.get(addr()).unwrap().clone();
        for _ in 0..5 {
            assert!(table.observe(pairing_record(1)).is_none());
            assert!(table.observe(connect_record(2)).is_none());
        }
        let after = table.get(addr()).unwrap();

        assert_eq!(after.phase, before.phase);
        assert_eq!(after.paired, before.paired);
        assert_eq!(after.connected, before.connected);
    }

    #[test]
    fn test_connected_implies_paired() {
        let mut table = DeviceStateTable::new();
        table.observe(pairing_record(1));
        table.observe(connect_record(2));
        table.mark_paired(addr());
        table.begin_connect(addr());
        table.mark_connected(addr());

        let state = table.get(addr()).unwrap();
        assert!(state.connected);
        assert!(state.paired);
        assert_eq!(state.phase, DevicePhase::Connected);
    }

    #[test]
    fn test_connect_failure_keeps_paired_flag() {
        let mut table = DeviceStateTable::new();
        table.observe(pairing_record(1));
        table.observe(connect_record(2));
        table.mark_paired(addr());
        table.begin_connect(addr());
        table.mark_failed(addr(), "connect failed: connection refused");

        let state = table.get(addr()).unwrap();
        assert!(state.paired);
        assert!(!state.connected);
        assert_eq!(state.phase, DevicePhase::Failed);
    }

    #[test]
    fn test_independent_addresses_do_not_interfere() {
        let other = Ipv4Addr::new(10, 0, 0, 1);
        let mut table = DeviceStateTable::new();

        table.observe(pairing_record(1));
        table.observe(ServiceRecord {
            name: "other-pairing".to_string(),
            kind: ServiceKind::Pairing,
            address: other,
            port: 11,
        });
        assert!(table.observe(connect_record(2)).is_some());

        // The other address is still waiting for its connect record
        assert_eq!(
            table.get(other).unwrap().phase,
            DevicePhase::PartiallyDiscovered
        );
    }
}
