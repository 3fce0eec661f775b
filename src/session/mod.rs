//! Session-scoped configuration and orchestration
//!
//! A session is one bounded attempt to discover and connect exactly one
//! device. Everything the session needs (name, secret, timeout) lives in
//! an explicit [`SessionConfig`] value so that independent sessions never
//! share ambient state.

pub mod gate;
pub mod orchestrator;

pub use gate::{completion_gate, CompletionGate};
pub use orchestrator::{DeviceFailure, DiscoveryFeed, Session, SessionOutcome};

use std::time::Duration;

use rand::{distributions::Alphanumeric, Rng};

/// Default wall-clock deadline for one pairing session
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Length of the generated session name and secret
const CODE_LEN: usize = 8;

/// One session's identity and limits
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Random instance name shown to the device during pairing
    pub session_name: String,
    /// One-time secret submitted to every pair call
    pub secret: String,
    /// Wall-clock deadline for the whole session
    pub timeout: Duration,
}

impl SessionConfig {
    /// Generate fresh random credentials for a new session
    pub fn generate(timeout: Duration) -> Self {
        Self {
            session_name: random_code(CODE_LEN),
            secret: random_code(CODE_LEN),
            timeout,
        }
    }

    /// Build a config with fixed credentials (used by tests)
    pub fn with_credentials(
        session_name: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            session_name: session_name.into(),
            secret: secret.into(),
            timeout,
        }
    }

    /// Payload an external encoder renders as the pairing QR code
    pub fn pairing_payload(&self) -> String {
        format!("WIFI:T:ADB;S:{};P:{};;", self.session_name, self.secret)
    }
}

fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
