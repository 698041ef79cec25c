//! Events delivered to the control loop.
//!
//! Every external stimulus, platform callbacks, timers, user actions, is
//! funneled into one [`Event`] stream consumed by a single task; handlers
//! therefore never race each other.

use crate::model::{NetworkId, ScanBatch, ScanResult};
use crate::platform::scanner::ScanSource;

/// Timers the control loop arms. Each tag has at most one pending alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTag {
    /// Disconnected-mode safety-net scan.
    Watchdog,
    /// Next screen-on periodic scan.
    PeriodicScan,
    /// Retry a single scan that failed to start.
    RestartSingleScan { full_band: bool },
    /// Retry the whole connectivity scan after PNO candidates were rejected.
    RestartConnectivityScan,
}

impl AlarmTag {
    /// Stable name used to key pending timers; the payload does not
    /// participate, so re-arming a tag replaces its previous timer.
    pub fn name(self) -> &'static str {
        match self {
            AlarmTag::Watchdog => "watchdog",
            AlarmTag::PeriodicScan => "periodic_scan",
            AlarmTag::RestartSingleScan { .. } => "restart_single_scan",
            AlarmTag::RestartConnectivityScan => "restart_connectivity_scan",
        }
    }
}

/// Screen and association state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Unknown,
    Connected,
    Disconnected,
    /// Mid-handshake; selection stays quiet until it settles.
    Transitioning,
}

/// One stimulus for the control loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// A single scan finished successfully; the batch follows separately.
    ScanSuccess { source: ScanSource },
    /// A scan failed to start or complete.
    ScanFailure { source: ScanSource },
    /// A streaming per-AP result from a scan in flight.
    ScanResult { source: ScanSource, result: ScanResult },
    /// Terminal batch of results for a finished scan.
    ScanBatch { source: ScanSource, batch: ScanBatch },
    /// Firmware matched a PNO network while disconnected.
    PnoNetworkFound { results: Vec<ScanResult> },
    /// A timer armed through the alarm service fired.
    Alarm(AlarmTag),
    ScreenStateChanged { on: bool },
    ConnectionStateChanged(WifiState),
    /// Policy toggle for externally scored ephemeral networks.
    UntrustedConnectionAllowed(bool),
    /// The user explicitly picked a network from the UI.
    UserConnectChoice { network_id: NetworkId },
    /// An external component wants a scan right now.
    ForceConnectivityScan,
    /// Start or stop monitoring a specific BSSID.
    TrackBssid { bssid: String, available: bool },
    WifiEnabled(bool),
    Shutdown,
}
