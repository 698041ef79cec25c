//! Link layer interface: current association state and connect/roam commands.

use crate::model::{NetworkConfig, NetworkId};

/// Snapshot of the current association.
#[derive(Debug, Clone, Default)]
pub struct LinkInfo {
    pub network_id: Option<NetworkId>,
    pub bssid: Option<String>,
    pub ssid: Option<String>,
    /// RSSI of the current association in dBm.
    pub rssi: i32,
    /// Frequency of the current association in MHz.
    pub frequency: u32,
    pub supplicant_connecting: bool,
    /// Smoothed transmitted packet rate, packets per second.
    pub tx_success_rate: f64,
    pub rx_success_rate: f64,
}

impl LinkInfo {
    pub fn is_24ghz(&self) -> bool {
        (2400..=2500).contains(&self.frequency)
    }
}

/// The supplicant-facing side of the platform.
pub trait LinkLayer: Send {
    fn is_connected(&self) -> bool;
    fn is_disconnected(&self) -> bool;
    /// True while the link is flapping and state should not be trusted.
    fn is_link_debouncing(&self) -> bool;
    /// True while the supplicant is mid-handshake.
    fn is_supplicant_transient(&self) -> bool;
    fn link_info(&self) -> LinkInfo;
    /// Configuration of the currently associated network, if any.
    fn get_current_configuration(&self) -> Option<NetworkConfig>;
    /// Switch BSSID without a fresh L3 setup. Same network only.
    fn start_roam_to_network(&mut self, network_id: NetworkId, bssid: &str);
    /// Full connect, tearing down any existing association.
    fn start_connect_to_network(&mut self, network_id: NetworkId, bssid: &str);
}
