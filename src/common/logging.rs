//! Logging configuration using tracing
//!
//! Logs go to a file so stdout stays free for the pairing instructions
//! and the session outcome.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::error::Result;

/// Initialize the logging subsystem
///
/// Logs are written to the platform data directory under `adb-autopair/logs/`.
/// Log level is controlled by the `ADBPAIR_LOG` environment variable.
///
/// # Examples
/// ```bash
/// ADBPAIR_LOG=debug adbpair
/// ADBPAIR_LOG=trace adbpair
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "adbpair.log");

    // Default to info, allow override via ADBPAIR_LOG
    let env_filter = EnvFilter::try_from_env("ADBPAIR_LOG")
        .unwrap_or_else(|_| EnvFilter::new("adb_autopair=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("adb-autopair starting");
    tracing::info!("Log directory: {}", log_dir.display());

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("adb-autopair").join("logs")
}
