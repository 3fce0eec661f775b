//! External adb tool plumbing
//!
//! Locates the adb binary, carries the session's environment overrides,
//! restarts the adb server so those overrides take effect, and parses
//! `adb devices` output. The pair/connect action wrappers live in
//! [`actions`].

pub mod actions;

pub use actions::{ActionOutput, AdbActions, PairingActions, SuccessHeuristics};

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use crate::common::prelude::*;

/// Env override enabling adb's openscreen mDNS backend, which is required
/// for QR pairing discovery on some platforms
const ADB_MDNS_OPENSCREEN: (&str, &str) = ("ADB_MDNS_OPENSCREEN", "1");

/// adb invocation context: binary path plus the session's env overrides.
///
/// Overrides are carried here explicitly instead of being written into the
/// ambient process environment, so independent sessions cannot cross-talk.
#[derive(Debug, Clone)]
pub struct AdbEnv {
    program: PathBuf,
    env: Vec<(String, String)>,
}

impl AdbEnv {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            env: vec![(
                ADB_MDNS_OPENSCREEN.0.to_string(),
                ADB_MDNS_OPENSCREEN.1.to_string(),
            )],
        }
    }

    /// Locate adb on PATH
    pub fn locate() -> Result<Self> {
        let program = which::which("adb").map_err(|_| Error::AdbNotFound)?;
        debug!("using adb at {}", program.display());
        Ok(Self::new(program))
    }

    /// Build a command with the session env applied and pipes attached
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Restart the adb server so the mDNS env override takes effect
    pub async fn restart_server(&self) -> Result<()> {
        info!("restarting adb server");
        for arg in ["kill-server", "start-server"] {
            self.command()
                .arg(arg)
                .output()
                .await
                .map_err(|e| Error::process(format!("adb {arg} failed: {e}")))?;
        }
        Ok(())
    }

    /// List serials currently in state `device`
    pub async fn devices(&self) -> Result<Vec<String>> {
        let output = self
            .command()
            .arg("devices")
            .output()
            .await
            .map_err(|e| Error::process(format!("adb devices failed: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_device_serials(&stdout))
    }

    /// Serial of a ready device, preferring wireless (`ip:port`) serials
    pub async fn connected_serial(&self) -> Result<Option<String>> {
        let serials = self.devices().await?;
        Ok(preferred_serial(&serials).cloned())
    }

    /// Poll `adb devices` until a serial shows up.
    ///
    /// After a successful connect the device can take a moment to appear in
    /// the device list, so a bounded retry loop is needed.
    pub async fn wait_for_serial(&self, attempts: u32, delay: Duration) -> Result<Option<String>> {
        for attempt in 0..attempts {
            if let Some(serial) = self.connected_serial().await? {
                return Ok(Some(serial));
            }
            trace!("no device yet (attempt {}/{attempts})", attempt + 1);
            tokio::time::sleep(delay).await;
        }
        Ok(None)
    }
}

/// Parse `adb devices` output into serials in state `device`.
///
/// Serials may contain spaces (some OEM wireless serials do), so the state
/// column is split off from the right.
pub fn parse_device_serials(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.to_lowercase().starts_with("list of devices") {
                return None;
            }
            let (serial, state) = line.rsplit_once(|c: char| c.is_whitespace())?;
            if state == "device" {
                Some(serial.trim().to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Pick a serial from the list, wireless (`ip:port`) ones first
pub fn preferred_serial(serials: &[String]) -> Option<&String> {
    serials
        .iter()
        .find(|s| wireless_serial_re().is_match(s))
        .or_else(|| serials.first())
}

fn wireless_serial_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d+\.\d+\.\d+\.\d+:\d+").expect("wireless serial regex is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_serials_basic() {
        let output = "List of devices attached\nemulator-5554\tdevice\n192.168.1.20:40001\tdevice\n\n";
        let serials = parse_device_serials(output);
        assert_eq!(serials, vec!["emulator-5554", "192.168.1.20:40001"]);
    }

    #[test]
    fn test_parse_device_serials_skips_other_states() {
        let output = "List of devices attached\nabc123\toffline\ndef456\tunauthorized\nghi789\tdevice\n";
        let serials = parse_device_serials(output);
        assert_eq!(serials, vec!["ghi789"]);
    }

    #[test]
    fn test_parse_device_serials_allows_spaces_in_serial() {
        let output = "List of devices attached\nSome Vendor Serial 01\tdevice\n";
        let serials = parse_device_serials(output);
        assert_eq!(serials, vec!["Some Vendor Serial 01"]);
    }

    #[test]
    fn test_parse_device_serials_empty_output() {
        assert!(parse_device_serials("").is_empty());
        assert!(parse_device_serials("List of devices attached\n\n").is_empty());
    }

    #[test]
    fn test_preferred_serial_picks_wireless_first() {
        let serials = vec![
            "emulator-5554".to_string(),
            "192.168.1.20:40001".to_string(),
        ];
        assert_eq!(
            preferred_serial(&serials),
            Some(&"192.168.1.20:40001".to_string())
        );
    }

    #[test]
    fn test_preferred_serial_falls_back_to_first() {
        let serials = vec!["emulator-5554".to_string(), "abc123".to_string()];
        assert_eq!(preferred_serial(&serials), Some(&"emulator-5554".to_string()));
        assert_eq!(preferred_serial(&[]), None);
    }

    #[test]
    fn test_adb_env_carries_mdns_override() {
        let env = AdbEnv::new(PathBuf::from("adb"));
        assert!(env
            .env
            .iter()
            .any(|(k, v)| k == "ADB_MDNS_OPENSCREEN" && v == "1"));
    }
}
