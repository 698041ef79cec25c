//! Scan subsystem interface.
//!
//! Scan completion is reported asynchronously as [`Event`](crate::events::Event)
//! messages on the control loop's channel; implementations capture the sender
//! at construction time.

use crate::model::NetworkId;

/// Which scheduling path asked for a scan. Tagged onto every result event so
/// the loop can route completions back to the right handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSource {
    /// Listener registered for all single scans, regardless of requester.
    AllSingle,
    /// A single scan this loop requested itself.
    Single { full_band: bool },
    /// Firmware-offloaded PNO scan.
    Pno,
}

/// Band selector for a single scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanBand {
    /// All 2.4GHz and 5GHz channels including DFS.
    BothWithDfs,
    /// No band; scan exactly the channels listed in the request.
    ChannelList,
}

/// Hidden network entry included in scan requests so hidden APs answer.
#[derive(Debug, Clone)]
pub struct HiddenNetwork {
    pub ssid: String,
}

/// Parameters for one single scan.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub band: ScanBand,
    /// Only consulted when `band` is `ChannelList`.
    pub channels: Vec<u32>,
    /// Report results per AP as they arrive, plus a terminal batch.
    pub report_each_result: bool,
    pub hidden_networks: Vec<HiddenNetwork>,
}

/// One network the firmware should match during PNO.
#[derive(Debug, Clone)]
pub struct PnoNetwork {
    pub ssid: String,
    pub network_id: NetworkId,
    pub hidden: bool,
}

/// Firmware PNO scan parameters.
#[derive(Debug, Clone)]
pub struct PnoSettings {
    pub interval_millis: i64,
    /// RSSI floors below which the firmware suppresses matches.
    pub min_rssi_24ghz: i32,
    pub min_rssi_5ghz: i32,
    /// Score ceiling for the firmware's built-in candidate scoring.
    pub initial_score_max: i32,
    pub networks: Vec<PnoNetwork>,
}

/// The scan-capable side of the platform.
pub trait WifiScanner: Send {
    /// Subscribe to completions of every single scan on the system,
    /// including scans requested by other components.
    fn register_all_single_scans_listener(&mut self);
    /// Start one single scan; results arrive tagged with `source`.
    fn start_scan(&mut self, settings: ScanSettings, source: ScanSource);
    /// Start a disconnected-mode PNO scan.
    fn start_disconnected_pno_scan(&mut self, scan: ScanSettings, pno: PnoSettings);
    fn stop_pno_scan(&mut self);
}
