//! Configuration store interface and an in-memory implementation.
//!
//! The store owns every `NetworkConfig`; the core reads clones and writes
//! selection state back exclusively through these operations.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;
use thiserror::Error;

use crate::model::{DisableReason, NetworkConfig, NetworkId, ScanResult};
use crate::platform::scanner::{HiddenNetwork, PnoNetwork};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network {0} not found")]
    NotFound(NetworkId),

    #[error("rejected configuration for '{0}'")]
    Rejected(String),
}

/// The persistence side of the platform. All candidate/selection writes
/// performed during an evaluation pass flow through here.
pub trait ConfigStore: Send {
    fn get_configured_network(&self, id: NetworkId) -> Option<NetworkConfig>;
    /// Lookup by config key (SSID + security class).
    fn get_configured_network_for_key(&self, key: &str) -> Option<NetworkConfig>;
    fn get_saved_networks(&self) -> Vec<NetworkConfig>;

    /// Record the best scan result seen for a network in the current pass.
    fn set_network_candidate_scan_result(
        &mut self,
        id: NetworkId,
        result: &ScanResult,
        score: i32,
    );
    fn clear_network_candidate_scan_result(&mut self, id: NetworkId);
    fn set_seen_in_last_selection(&mut self, id: NetworkId, seen: bool);

    /// Re-enable a network disabled for a temporary reason. Permanent
    /// disables stay in place.
    fn try_enable_network(&mut self, id: NetworkId);
    /// Force-enable a network regardless of the disable reason. An explicit
    /// user pick overrides even a permanent disable.
    fn enable_network(&mut self, id: NetworkId);
    /// Record a connection failure; bumps the per-reason counter and may
    /// disable the network for selection.
    fn update_network_selection_status(&mut self, id: NetworkId, reason: DisableReason);

    fn set_network_connect_choice(&mut self, id: NetworkId, key: &str, timestamp_millis: i64);
    fn clear_network_connect_choice(&mut self, id: NetworkId);

    /// The network the user most recently picked by hand, if any. Its
    /// timestamp is monotonic millis, for the decaying selection award.
    fn get_last_selected_network(&self) -> Option<NetworkId>;
    fn get_last_selected_timestamp(&self) -> i64;
    fn set_last_selected_network(&mut self, id: NetworkId, timestamp_millis: i64);

    /// Channels this network was recently seen on, including
    /// `current_frequency` when nonzero. `None` when the cached set is older
    /// than `max_age_millis` or absent, in which case the caller falls back
    /// to a full-band scan.
    fn fetch_channel_set_for_network(
        &self,
        id: NetworkId,
        max_age_millis: i64,
        current_frequency: u32,
    ) -> Option<BTreeSet<u32>>;

    fn retrieve_hidden_network_list(&self) -> Vec<HiddenNetwork>;
    fn retrieve_pno_network_list(&self) -> Vec<PnoNetwork>;

    /// Whether the user deleted an ephemeral network with this SSID. Such
    /// networks are never auto-created again.
    fn was_ephemeral_network_deleted(&self, ssid: &str) -> bool;

    /// Insert or replace a configuration, assigning an ID for new entries.
    fn add_or_update_network(&mut self, config: NetworkConfig) -> Result<NetworkId, StoreError>;
}

/// Per-network channel history kept by the in-memory store.
#[derive(Debug, Clone, Default)]
struct ChannelHistory {
    channels: BTreeSet<u32>,
    updated_at_millis: i64,
}

/// In-memory store used by the simulated platform and the test suite.
#[derive(Default)]
pub struct MemoryConfigStore {
    networks: HashMap<NetworkId, NetworkConfig>,
    channel_history: HashMap<NetworkId, ChannelHistory>,
    next_id: i32,
    now_millis: i64,
    last_selected: Option<(NetworkId, i64)>,
    deleted_ephemeral: HashSet<String>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        MemoryConfigStore::default()
    }

    /// Seed a saved network, assigning the next free ID.
    pub fn insert(&mut self, mut config: NetworkConfig) -> NetworkId {
        let id = NetworkId(self.next_id);
        self.next_id += 1;
        config.network_id = id;
        self.networks.insert(id, config);
        id
    }

    pub fn set_channel_history(
        &mut self,
        id: NetworkId,
        channels: impl IntoIterator<Item = u32>,
        updated_at_millis: i64,
    ) {
        self.channel_history.insert(
            id,
            ChannelHistory {
                channels: channels.into_iter().collect(),
                updated_at_millis,
            },
        );
    }

    /// Current wall time for channel-history freshness checks; the simulated
    /// platform bumps this alongside its clock.
    pub fn set_now_millis(&mut self, now: i64) {
        self.now_millis = now;
    }

    /// Record the user deleting an ephemeral network.
    pub fn note_ephemeral_deleted(&mut self, ssid: &str) {
        self.deleted_ephemeral.insert(ssid.to_owned());
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_configured_network(&self, id: NetworkId) -> Option<NetworkConfig> {
        self.networks.get(&id).cloned()
    }

    fn get_configured_network_for_key(&self, key: &str) -> Option<NetworkConfig> {
        self.networks.values().find(|c| c.config_key() == key).cloned()
    }

    fn get_saved_networks(&self) -> Vec<NetworkConfig> {
        let mut all: Vec<_> = self.networks.values().cloned().collect();
        all.sort_by_key(|c| c.network_id);
        all
    }

    fn set_network_candidate_scan_result(
        &mut self,
        id: NetworkId,
        result: &ScanResult,
        score: i32,
    ) {
        if let Some(config) = self.networks.get_mut(&id) {
            config.status.candidate = Some(result.clone());
            config.status.candidate_score = Some(score);
        }
    }

    fn clear_network_candidate_scan_result(&mut self, id: NetworkId) {
        if let Some(config) = self.networks.get_mut(&id) {
            config.status.clear_candidate();
        }
    }

    fn set_seen_in_last_selection(&mut self, id: NetworkId, seen: bool) {
        if let Some(config) = self.networks.get_mut(&id) {
            config.status.seen_in_last_selection = seen;
        }
    }

    fn try_enable_network(&mut self, id: NetworkId) {
        if let Some(config) = self.networks.get_mut(&id) {
            match config.status.disabled_reason {
                Some(reason) if !reason.is_permanent() => {
                    debug!("Re-enabling network {} ({:?})", config.network_string(), reason);
                    config.status.disabled_reason = None;
                }
                _ => {}
            }
        }
    }

    fn enable_network(&mut self, id: NetworkId) {
        if let Some(config) = self.networks.get_mut(&id) {
            if let Some(reason) = config.status.disabled_reason.take() {
                debug!(
                    "Force-enabling network {} ({:?})",
                    config.network_string(),
                    reason
                );
            }
        }
    }

    fn update_network_selection_status(&mut self, id: NetworkId, reason: DisableReason) {
        if let Some(config) = self.networks.get_mut(&id) {
            config.status.bump_disable_counter(reason);
            config.status.disabled_reason = Some(reason);
            debug!(
                "Disabled network {} for {:?}",
                config.network_string(),
                reason
            );
        }
    }

    fn set_network_connect_choice(&mut self, id: NetworkId, key: &str, timestamp_millis: i64) {
        if let Some(config) = self.networks.get_mut(&id) {
            config.status.connect_choice = Some(key.to_owned());
            config.status.connect_choice_timestamp = timestamp_millis;
        }
    }

    fn clear_network_connect_choice(&mut self, id: NetworkId) {
        if let Some(config) = self.networks.get_mut(&id) {
            config.status.connect_choice = None;
            config.status.connect_choice_timestamp = 0;
        }
    }

    fn get_last_selected_network(&self) -> Option<NetworkId> {
        self.last_selected.map(|(id, _)| id)
    }

    fn get_last_selected_timestamp(&self) -> i64 {
        self.last_selected.map(|(_, ts)| ts).unwrap_or(0)
    }

    fn set_last_selected_network(&mut self, id: NetworkId, timestamp_millis: i64) {
        self.last_selected = Some((id, timestamp_millis));
    }

    fn fetch_channel_set_for_network(
        &self,
        id: NetworkId,
        max_age_millis: i64,
        current_frequency: u32,
    ) -> Option<BTreeSet<u32>> {
        let history = self.channel_history.get(&id)?;
        if self.now_millis - history.updated_at_millis > max_age_millis {
            return None;
        }
        let mut channels = history.channels.clone();
        if current_frequency > 0 {
            channels.insert(current_frequency);
        }
        Some(channels)
    }

    fn retrieve_hidden_network_list(&self) -> Vec<HiddenNetwork> {
        self.get_saved_networks()
            .into_iter()
            .map(|c| HiddenNetwork { ssid: c.ssid })
            .collect()
    }

    fn retrieve_pno_network_list(&self) -> Vec<PnoNetwork> {
        self.get_saved_networks()
            .into_iter()
            .filter(|c| !c.ephemeral && c.status.is_enabled())
            .map(|c| PnoNetwork {
                ssid: c.ssid,
                network_id: c.network_id,
                hidden: false,
            })
            .collect()
    }

    fn was_ephemeral_network_deleted(&self, ssid: &str) -> bool {
        self.deleted_ephemeral.contains(ssid)
    }

    fn add_or_update_network(&mut self, mut config: NetworkConfig) -> Result<NetworkId, StoreError> {
        if config.ssid.is_empty() {
            return Err(StoreError::Rejected(config.ssid));
        }
        if config.network_id.is_valid() {
            let id = config.network_id;
            if !self.networks.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
            self.networks.insert(id, config);
            Ok(id)
        } else {
            let id = NetworkId(self.next_id);
            self.next_id += 1;
            config.network_id = id;
            self.networks.insert(id, config);
            Ok(id)
        }
    }
}
