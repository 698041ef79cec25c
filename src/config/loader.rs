// src/config/loader.rs

//! # Configuration Loader
//!
//! Reads the daemon's TOML config, deserializes into `ConfigStub`, and
//! converts raw tables into the runtime `Config` with defaults filled in.

use log::{debug, info};
use std::{fs, path::Path, time::Duration};

use crate::config::model::{Config, ConfigError, ConfigStub, ScanConfig, ScanStub};

/// Load and parse the configuration from `path`.
/// Logs at DEBUG before reading and INFO on success.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    debug!("Reading config from {:?}", path);
    let txt = fs::read_to_string(path)?;
    let stub: ConfigStub = toml::from_str(&txt)?;
    let cfg = convert_stub(stub)?;
    info!("Loaded config from {:?}", path);
    Ok(cfg)
}

/// Convert the raw deserialized stub into the typed runtime config.
pub fn convert_stub(stub: ConfigStub) -> Result<Config, ConfigError> {
    Ok(Config {
        logging: stub.logging.unwrap_or_default(),
        scan: convert_scan(stub.scan.unwrap_or_default())?,
        selection: stub.selection.unwrap_or_default(),
        scoring: stub.scoring.unwrap_or_default(),
    })
}

fn convert_scan(stub: ScanStub) -> Result<ScanConfig, ConfigError> {
    let defaults = ScanConfig::default();
    Ok(ScanConfig {
        periodic_interval: parse_duration(stub.periodic_interval, defaults.periodic_interval)?,
        max_periodic_interval: parse_duration(
            stub.max_periodic_interval,
            defaults.max_periodic_interval,
        )?,
        pno_interval: parse_duration(stub.pno_interval, defaults.pno_interval)?,
        watchdog_interval: parse_duration(stub.watchdog_interval, defaults.watchdog_interval)?,
        restart_delay: parse_duration(stub.restart_delay, defaults.restart_delay)?,
        max_scan_restarts: stub.max_scan_restarts.unwrap_or(defaults.max_scan_restarts),
        low_rssi_retry_start: parse_duration(
            stub.low_rssi_retry_start,
            defaults.low_rssi_retry_start,
        )?,
        low_rssi_retry_max: parse_duration(stub.low_rssi_retry_max, defaults.low_rssi_retry_max)?,
        channel_list_age: parse_duration(stub.channel_list_age, defaults.channel_list_age)?,
        max_tx_packet_rate: stub.max_tx_packet_rate.unwrap_or(defaults.max_tx_packet_rate),
        max_rx_packet_rate: stub.max_rx_packet_rate.unwrap_or(defaults.max_rx_packet_rate),
    })
}

/// Parse an optional humantime string, falling back to `default`.
fn parse_duration(raw: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match raw {
        Some(s) => humantime::parse_duration(&s)
            .map_err(|e| ConfigError::InvalidDuration(s, e)),
        None => Ok(default),
    }
}
