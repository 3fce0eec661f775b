//! Pair and connect action wrappers
//!
//! Both actions wrap a blocking external adb call and judge success with
//! output heuristics on top of the exit status: `adb pair` can exit 0 on
//! some failures without printing its success marker, and `adb connect`
//! exits 0 on several error paths while printing "failed to connect" or
//! "connection refused". The marker strings are configuration, not
//! hard-coded literals at the call sites, because upstream message text is
//! not a stable contract.

use std::net::Ipv4Addr;

use crate::common::prelude::*;

use super::AdbEnv;

/// Output-matching rules deciding whether an adb invocation actually worked
#[derive(Debug, Clone)]
pub struct SuccessHeuristics {
    /// Substring that must appear in `adb pair` output (case-insensitive)
    pub pair_success_marker: String,
    /// Substrings whose presence in `adb connect` output means failure
    /// (case-insensitive)
    pub connect_failure_markers: Vec<String>,
}

impl Default for SuccessHeuristics {
    fn default() -> Self {
        Self {
            pair_success_marker: "success".to_string(),
            connect_failure_markers: vec!["refused".to_string(), "failed".to_string()],
        }
    }
}

impl SuccessHeuristics {
    /// Judge an `adb pair` invocation: zero exit status AND the success
    /// marker present in the combined output
    pub fn pair_succeeded(&self, exit_ok: bool, combined_output: &str) -> bool {
        exit_ok
            && combined_output
                .to_lowercase()
                .contains(&self.pair_success_marker.to_lowercase())
    }

    /// Judge an `adb connect` invocation: zero exit status AND none of the
    /// failure markers present in the combined output
    pub fn connect_succeeded(&self, exit_ok: bool, combined_output: &str) -> bool {
        let lower = combined_output.to_lowercase();
        exit_ok
            && !self
                .connect_failure_markers
                .iter()
                .any(|marker| lower.contains(&marker.to_lowercase()))
    }
}

/// Result of one external action
#[derive(Debug, Clone)]
pub struct ActionOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ActionOutput {
    /// Diagnostic text surfaced to the operator on failure. Prefers stderr,
    /// falls back to stdout; the raw tool text is kept verbatim.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        "no output from adb".to_string()
    }
}

/// The two external operations the correlator drives.
///
/// Calling either again for the same address is safe; the correlator is
/// responsible for invoking each at most once per address per session.
#[trait_variant::make(PairingActions: Send)]
pub trait LocalPairingActions {
    /// Submit the session secret to the device's pairing endpoint
    async fn pair(&self, address: Ipv4Addr, port: u16, secret: &str) -> ActionOutput;

    /// Connect to the device's debugging endpoint
    async fn connect(&self, address: Ipv4Addr, port: u16) -> ActionOutput;
}

/// Subprocess-backed implementation invoking `adb pair` / `adb connect`
pub struct AdbActions {
    adb: AdbEnv,
    heuristics: SuccessHeuristics,
}

impl AdbActions {
    pub fn new(adb: AdbEnv, heuristics: SuccessHeuristics) -> Self {
        Self { adb, heuristics }
    }

    async fn run(&self, args: &[&str]) -> Result<(bool, String, String)> {
        let output = self
            .adb
            .command()
            .args(args)
            .output()
            .await
            .map_err(|e| Error::process(format!("adb {} failed: {e}", args.join(" "))))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        debug!(args = ?args, exit = ?output.status.code(), "adb finished");

        Ok((output.status.success(), stdout, stderr))
    }
}

impl PairingActions for AdbActions {
    async fn pair(&self, address: Ipv4Addr, port: u16, secret: &str) -> ActionOutput {
        let endpoint = format!("{address}:{port}");
        info!(endpoint = %endpoint, "running adb pair");

        match self.run(&["pair", &endpoint, secret]).await {
            Ok((exit_ok, stdout, stderr)) => {
                let combined = format!("{stdout}\n{stderr}");
                ActionOutput {
                    success: self.heuristics.pair_succeeded(exit_ok, &combined),
                    stdout,
                    stderr,
                }
            }
            Err(e) => ActionOutput {
                success: false,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }

    async fn connect(&self, address: Ipv4Addr, port: u16) -> ActionOutput {
        let endpoint = format!("{address}:{port}");
        info!(endpoint = %endpoint, "running adb connect");

        match self.run(&["connect", &endpoint]).await {
            Ok((exit_ok, stdout, stderr)) => {
                let combined = format!("{stdout}\n{stderr}");
                ActionOutput {
                    success: self.heuristics.connect_succeeded(exit_ok, &combined),
                    stdout,
                    stderr,
                }
            }
            Err(e) => ActionOutput {
                success: false,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }
}
