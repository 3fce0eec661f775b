//! Core domain: advertisement records, per-device state, and the pure
//! correlation state machine.
//!
//! Nothing in this module performs I/O or touches concurrency primitives.
//! The session layer owns locking and dispatch; the functions here take a
//! mutable table and return the action plan to execute, if any.

pub mod correlator;
pub mod record;
pub mod state;

pub use correlator::PairAttempt;
pub use record::{
    parse_advertisement, Advertisement, ServiceKind, ServiceRecord, CONNECT_SERVICE_TYPE,
    PAIRING_SERVICE_TYPE, SERVICE_TYPES,
};
pub use state::{DevicePhase, DeviceState, DeviceStateTable};
