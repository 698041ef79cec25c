//! Runtime configuration structures.
//!
//! Raw TOML mirror structs are deserialized first and then converted into
//! fully-typed runtime structs with defaults filled in, keeping the file
//! format separate from what the control loop consumes.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Top-level runtime config
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub scan: ScanConfig,
    pub selection: SelectionConfig,
    pub scoring: ScoringConfig,
}

/// Mirror of the `[logging]` table
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_file: bool,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_level")]
    pub level: String,
}
fn default_level() -> String {
    "INFO".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            enable_file: false,
            file: None,
            level: default_level(),
        }
    }
}

/// Scan cadence knobs. Durations are written humantime-style in TOML
/// ("20s", "5m", "1h").
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Screen-on periodic single scan base interval.
    pub periodic_interval: Duration,
    /// Ceiling for the exponentially backed-off periodic interval.
    pub max_periodic_interval: Duration,
    /// Firmware PNO scan interval while disconnected with the screen off.
    pub pno_interval: Duration,
    /// Unconditional single-scan safety net while disconnected.
    pub watchdog_interval: Duration,
    /// Delay before retrying a scan that failed to start.
    pub restart_delay: Duration,
    /// Give up after this many consecutive failed scan starts.
    pub max_scan_restarts: u32,
    /// Starting retry delay after PNO candidates are rejected for low RSSI.
    pub low_rssi_retry_start: Duration,
    pub low_rssi_retry_max: Duration,
    /// Cached per-network channel sets older than this force a full-band scan.
    pub channel_list_age: Duration,
    /// Tx/rx packet rates (pkt/s) above which a connected periodic scan only
    /// covers the current network's channels.
    pub max_tx_packet_rate: f64,
    pub max_rx_packet_rate: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            periodic_interval: Duration::from_secs(20),
            max_periodic_interval: Duration::from_secs(160),
            pno_interval: Duration::from_secs(20),
            watchdog_interval: Duration::from_secs(20 * 60),
            restart_delay: Duration::from_secs(2),
            max_scan_restarts: 5,
            low_rssi_retry_start: Duration::from_secs(20),
            low_rssi_retry_max: Duration::from_secs(80),
            channel_list_age: Duration::from_secs(60 * 60),
            max_tx_packet_rate: 8.0,
            max_rx_packet_rate: 16.0,
        }
    }
}

/// Mirror of the `[selection]` table
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Allow switching networks while already associated (roaming).
    #[serde(default = "default_true")]
    pub enable_auto_join_when_associated: bool,
    /// Allow untrusted (externally scored, ephemeral) networks at startup.
    #[serde(default)]
    pub untrusted_networks_allowed: bool,
}
fn default_true() -> bool {
    true
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            enable_auto_join_when_associated: true,
            untrusted_networks_allowed: false,
        }
    }
}

/// Composite-score parameters for the saved network evaluator, plus the RSSI
/// thresholds shared with scan filtering and PNO settings. RSSI values are
/// dBm.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rssi_score_slope: i32,
    pub rssi_score_offset: i32,
    pub same_bssid_award: i32,
    pub same_network_award: i32,
    pub band_5ghz_award: i32,
    /// Decays by one point per minute since the user's explicit choice.
    pub last_selection_award: i32,
    pub passpoint_security_award: i32,
    pub security_award: i32,
    /// RSSI saturation point: stronger signals score no higher.
    pub saturated_rssi_24ghz: i32,
    pub saturated_rssi_5ghz: i32,
    /// A connected network at or above this needs no replacement.
    pub qualified_rssi_24ghz: i32,
    pub qualified_rssi_5ghz: i32,
    /// Results below these never enter selection.
    pub min_rssi_24ghz: i32,
    pub min_rssi_5ghz: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            rssi_score_slope: 4,
            rssi_score_offset: 85,
            same_bssid_award: 24,
            same_network_award: 16,
            band_5ghz_award: 40,
            last_selection_award: 480,
            passpoint_security_award: 40,
            security_award: 80,
            saturated_rssi_24ghz: -60,
            saturated_rssi_5ghz: -57,
            qualified_rssi_24ghz: -73,
            qualified_rssi_5ghz: -70,
            min_rssi_24ghz: -85,
            min_rssi_5ghz: -82,
        }
    }
}

impl ScoringConfig {
    /// Minimum acceptable RSSI for the band of `frequency` (MHz).
    pub fn min_rssi(&self, is_24ghz: bool) -> i32 {
        if is_24ghz {
            self.min_rssi_24ghz
        } else {
            self.min_rssi_5ghz
        }
    }

    pub fn qualified_rssi(&self, is_24ghz: bool) -> i32 {
        if is_24ghz {
            self.qualified_rssi_24ghz
        } else {
            self.qualified_rssi_5ghz
        }
    }

    pub fn saturated_rssi(&self, is_24ghz: bool) -> i32 {
        if is_24ghz {
            self.saturated_rssi_24ghz
        } else {
            self.saturated_rssi_5ghz
        }
    }

    /// Highest score a pure 2.4GHz RSSI contribution can produce; also the
    /// initial score ceiling handed to firmware PNO scoring.
    pub fn initial_score_max(&self) -> i32 {
        (self.saturated_rssi_24ghz + self.rssi_score_offset) * self.rssi_score_slope
    }

    /// Penalty for networks that repeatedly reported no internet access and
    /// were never validated: large enough to undo every possible award.
    pub fn no_internet_penalty(&self) -> i32 {
        self.initial_score_max()
            + self.band_5ghz_award
            + self.same_network_award
            + self.same_bssid_award
            + self.security_award
    }
}

/// Raw `[scan]` table; durations arrive as humantime strings
#[derive(Debug, Default, Deserialize)]
pub struct ScanStub {
    pub periodic_interval: Option<String>,
    pub max_periodic_interval: Option<String>,
    pub pno_interval: Option<String>,
    pub watchdog_interval: Option<String>,
    pub restart_delay: Option<String>,
    pub max_scan_restarts: Option<u32>,
    pub low_rssi_retry_start: Option<String>,
    pub low_rssi_retry_max: Option<String>,
    pub channel_list_age: Option<String>,
    pub max_tx_packet_rate: Option<f64>,
    pub max_rx_packet_rate: Option<f64>,
}

/// Top-level config as deserialized from TOML; every table is optional
#[derive(Debug, Default, Deserialize)]
pub struct ConfigStub {
    pub logging: Option<LoggingConfig>,
    pub scan: Option<ScanStub>,
    pub selection: Option<SelectionConfig>,
    pub scoring: Option<ScoringConfig>,
}

/// All the ways config loading can go wrong
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration '{0}': {1}")]
    InvalidDuration(String, #[source] humantime::DurationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
