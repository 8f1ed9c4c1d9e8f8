//! iQua softener poller - host binary
//!
//! Loads configuration, performs the first refresh, then keeps the snapshot
//! fresh on the configured interval and prints every reading after each
//! successful update.

use anyhow::Context;
use clap::Parser;
use iqua_softener::{
    config::SoftenerConfig,
    logging::{init_logging, LogConfig},
    readings, HttpDeviceClient, PollingCoordinator, RawSnapshot,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

/// iQua water softener poller
#[derive(Parser, Debug)]
#[command(name = "iqua-softener-poller")]
#[command(about = "Poll an iQua water softener and print its readings")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "IQUA_CONFIG")]
    config: Option<PathBuf>,

    /// Account username
    #[arg(long, env = "IQUA_USERNAME")]
    username: Option<String>,

    /// Account password
    #[arg(long, env = "IQUA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Device serial number
    #[arg(long, env = "IQUA_DEVICE_SERIAL_NUMBER")]
    serial: Option<String>,

    /// Poll interval override, e.g. "10m"
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    interval: Option<Duration>,

    /// Fetch once, print and exit
    #[arg(long)]
    once: bool,

    /// Print readings as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<SoftenerConfig> {
        let mut config = match &self.config {
            Some(path) => SoftenerConfig::load(path)?,
            None => SoftenerConfig::new("", "", ""),
        };

        config.apply_env_overrides()?;
        config.apply_options(&iqua_softener::config::ConfigOptions {
            username: self.username.clone(),
            password: self.password.clone(),
            device_serial_number: self.serial.clone(),
            poll_interval_override: self.interval,
        });

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn print_readings(snapshot: &RawSnapshot, serial: &str, json: bool) -> anyhow::Result<()> {
    let derived = readings::derive_all(snapshot, chrono::Utc::now());

    if json {
        println!("{}", serde_json::to_string(&derived)?);
        return Ok(());
    }

    for reading in derived {
        println!("{:<40} {}", readings::unique_id(serial, reading.key), reading);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.debug {
        log_config.level = Level::DEBUG;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let config = cli.load_config()?;
    info!(
        serial = %config.device_serial_number,
        interval = ?config.poll_interval(),
        "Starting softener poller"
    );

    let client = HttpDeviceClient::new(&config)?;
    let coordinator =
        PollingCoordinator::new("iQua softener", Arc::new(client), config.poll_interval());

    let snapshot = coordinator
        .first_refresh()
        .await
        .context("first refresh failed")?;
    print_readings(&snapshot, &config.device_serial_number, cli.json)?;

    if cli.once {
        coordinator.shutdown().await;
        return Ok(());
    }

    let mut updates = coordinator.subscribe();
    let schedule = coordinator.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = updates.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    if let Err(e) = print_readings(&snapshot, &config.device_serial_number, cli.json) {
                        warn!("Failed to print readings: {e}");
                    }
                }
            }
        }
    }

    coordinator.shutdown().await;
    schedule.await?;
    Ok(())
}
