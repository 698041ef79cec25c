//! Scan result snapshots produced by the scan subsystem.

use serde::{Deserialize, Serialize};

/// One observed access point at one point in time. Immutable once produced;
/// the control loop only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Network name advertised by the AP. May be empty for hidden APs.
    pub ssid: String,
    /// MAC address of the AP radio, formatted `xx:xx:xx:xx:xx:xx`.
    pub bssid: String,
    /// Received signal strength in dBm. Higher (less negative) is stronger.
    pub rssi: i32,
    /// Primary channel frequency in MHz.
    pub frequency: u32,
    /// Raw capability string, e.g. `[WPA2-PSK-CCMP][ESS]`.
    pub capabilities: String,
    /// Microseconds since boot when this result was observed.
    pub timestamp_micros: i64,
}

impl ScanResult {
    pub fn is_24ghz(&self) -> bool {
        (2400..=2500).contains(&self.frequency)
    }

    pub fn is_5ghz(&self) -> bool {
        (4900..=5900).contains(&self.frequency)
    }

    /// `ssid:bssid` identifier used in log lines.
    pub fn scan_id(&self) -> String {
        format!("{}:{}", self.ssid, self.bssid)
    }
}

/// A fully assembled batch of single scan results. Streaming per-AP results
/// are buffered by the control loop and only processed once the terminal
/// batch event arrives.
#[derive(Debug, Clone, Default)]
pub struct ScanBatch {
    pub results: Vec<ScanResult>,
    /// Whether the scan that produced this batch covered every channel.
    /// Partial batches are discarded while a full-band scan is pending.
    pub all_channels_scanned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(frequency: u32) -> ScanResult {
        ScanResult {
            ssid: "net".into(),
            bssid: "00:11:22:33:44:55".into(),
            rssi: -60,
            frequency,
            capabilities: "[ESS]".into(),
            timestamp_micros: 0,
        }
    }

    #[test]
    fn band_classification() {
        assert!(result(2412).is_24ghz());
        assert!(!result(2412).is_5ghz());
        assert!(result(5180).is_5ghz());
        assert!(!result(5180).is_24ghz());
        assert!(!result(6000).is_5ghz());
    }
}
