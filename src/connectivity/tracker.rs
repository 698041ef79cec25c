//! Diagnostics roster of networks seen by recent selection passes.
//!
//! Every pass forwards its (scan result, configuration) pairs here whether or
//! not a candidate was chosen, so troubleshooting always has a picture of
//! what was visible.

use std::collections::HashMap;

use crate::selector::ConnectableNetwork;

#[derive(Debug, Clone)]
pub struct AvailableNetwork {
    pub ssid: String,
    pub network_id: Option<crate::model::NetworkId>,
    pub best_rssi: i32,
    pub times_seen: u32,
}

/// Rolling view of connectable networks, keyed by BSSID.
#[derive(Debug, Default)]
pub struct AvailableNetworksTracker {
    networks: HashMap<String, AvailableNetwork>,
}

impl AvailableNetworksTracker {
    pub fn new() -> Self {
        AvailableNetworksTracker::default()
    }

    pub fn update_available_networks(&mut self, connectable: &[ConnectableNetwork]) {
        for entry in connectable {
            let result = &entry.scan_result;
            let network = self
                .networks
                .entry(result.bssid.clone())
                .or_insert_with(|| AvailableNetwork {
                    ssid: result.ssid.clone(),
                    network_id: entry.config.as_ref().map(|c| c.network_id),
                    best_rssi: result.rssi,
                    times_seen: 0,
                });
            network.times_seen += 1;
            network.best_rssi = network.best_rssi.max(result.rssi);
            if network.network_id.is_none() {
                network.network_id = entry.config.as_ref().map(|c| c.network_id);
            }
        }
    }

    pub fn available_networks(&self) -> impl Iterator<Item = &AvailableNetwork> {
        self.networks.values()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
