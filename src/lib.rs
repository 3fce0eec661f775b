//! adb-autopair library
//!
//! Automates the wireless debugging pairing ritual: browse for the two adb
//! mDNS services, correlate them per device address, pair with a one-time
//! secret, connect, and hand back the connected address.

// Module declarations
pub mod adb;
pub mod common;
pub mod core;
pub mod mdns;
pub mod session;

// Re-export main entry points
pub use session::{DiscoveryFeed, Session, SessionConfig, SessionOutcome};
