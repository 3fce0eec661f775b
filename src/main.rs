//! adbpair - pair and connect a wireless debugging device automatically
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use adb_autopair::adb::{AdbActions, AdbEnv, SuccessHeuristics};
use adb_autopair::common::logging;
use adb_autopair::common::prelude::*;
use adb_autopair::mdns::MdnsFeed;
use adb_autopair::{Session, SessionConfig, SessionOutcome};

/// How long to poll `adb devices` after a successful connect
const SERIAL_POLL_ATTEMPTS: u32 = 10;
const SERIAL_POLL_DELAY: Duration = Duration::from_secs(1);

/// Pair and connect an Android device over wireless debugging
#[derive(Parser, Debug)]
#[command(name = "adbpair")]
#[command(
    about = "Pair and connect an Android device over wireless debugging",
    long_about = None
)]
struct Args {
    /// Seconds to wait for a device to pair and connect
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Path to the adb binary (defaults to the one on PATH)
    #[arg(long, value_name = "PATH")]
    adb: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().map_err(|e| Error::process(e.to_string()))?;
    let args = Args::parse();
    logging::init()?;

    let adb = match args.adb {
        Some(path) => AdbEnv::new(path),
        None => AdbEnv::locate()?,
    };

    // Restart the server so the mDNS env override takes effect
    adb.restart_server().await?;

    // A device already attached (USB or wireless) means there is nothing to
    // pair; just report it.
    if let Some(serial) = adb.connected_serial().await? {
        info!(serial = %serial, "device already connected");
        report_serial(&serial, args.json)?;
        return Ok(());
    }

    let config = SessionConfig::generate(Duration::from_secs(args.timeout));

    println!("No device connected.");
    println!("On the phone: Developer options > Wireless debugging > Pair device with QR code");
    println!();
    println!("Encode this payload as a QR code and scan it from the phone:");
    println!();
    println!("  {}", config.pairing_payload());
    println!();
    println!(
        "Waiting up to {}s for the device to pair...",
        args.timeout
    );

    let actions = AdbActions::new(adb.clone(), SuccessHeuristics::default());
    let session = Session::new(config, actions);
    let mut feed = MdnsFeed::new();

    let outcome = session.run(&mut feed).await?;

    match &outcome {
        SessionOutcome::Connected { address } => {
            println!("Connected to {address}.");
            // The device can take a moment to show up in `adb devices`
            match adb
                .wait_for_serial(SERIAL_POLL_ATTEMPTS, SERIAL_POLL_DELAY)
                .await?
            {
                Some(serial) => report_serial(&serial, args.json)?,
                None => {
                    eprintln!("Paired, but no device appears in `adb devices`.");
                    std::process::exit(5);
                }
            }
        }
        SessionOutcome::Failed { failures } => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                for failure in failures {
                    eprintln!("{}: {}", failure.address, failure.error);
                }
            }
            std::process::exit(4);
        }
        SessionOutcome::TimedOut => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                eprintln!("Timeout waiting for device. Check that:");
                eprintln!("  - phone and computer are on the same network");
                eprintln!("  - the network allows mDNS (guest Wi-Fi often does not)");
                eprintln!("  - the firewall allows mDNS (UDP 5353)");
            }
            std::process::exit(4);
        }
    }

    Ok(())
}

/// Print the connected serial for the caller (a human or the next tool in
/// the pipeline).
fn report_serial(serial: &str, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "outcome": "connected",
                "serial": serial,
            }))?
        );
    } else {
        println!("Device ready: {serial}");
    }
    Ok(())
}
