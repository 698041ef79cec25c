//! Network selection.
//!
//! `NetworkSelector` runs registered evaluators in priority order over a
//! filtered scan batch and produces at most one connection candidate per
//! pass. It also owns the BSSID blacklist and the user connect-choice links.

pub mod external;
pub mod saved;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::model::{ScoringConfig, SelectionConfig};
use crate::model::{NetworkConfig, NetworkId, ScanResult};
use crate::platform::{Clock, ConfigStore, LinkInfo};

pub use external::ExternalScoreEvaluator;
pub use saved::SavedNetworkEvaluator;

/// Evaluators register at a priority between 0 and this bound; 0 is the
/// highest priority. Unoccupied slots are skipped during a pass.
pub const EVALUATOR_MIN_PRIORITY: usize = 6;

/// Consecutive rejections before a BSSID is blacklisted.
pub const BSSID_BLACKLIST_THRESHOLD: u32 = 3;
/// How long a blacklisted BSSID stays filtered out.
pub const BSSID_BLACKLIST_EXPIRE_TIME_MS: i64 = 5 * 60 * 1000;
/// Minimum gap between two selection passes while connected.
pub const MINIMUM_NETWORK_SELECTION_INTERVAL_MS: i64 = 10 * 1000;

/// A scan result paired with the configuration it could connect, handed to
/// the available-networks tracker for diagnostics.
#[derive(Debug, Clone)]
pub struct ConnectableNetwork {
    pub scan_result: ScanResult,
    pub config: Option<NetworkConfig>,
}

/// One scoring strategy. Evaluators refresh external state in `update` and
/// nominate a candidate in `evaluate_networks`; all configuration writes go
/// through the store passed in per call.
pub trait NetworkEvaluator: Send {
    fn name(&self) -> &'static str;

    /// Refresh external dependencies with the new scan results. Mutates no
    /// selection state.
    fn update(&mut self, store: &mut dyn ConfigStore, scan_results: &[ScanResult]);

    fn evaluate_networks(
        &mut self,
        store: &mut dyn ConfigStore,
        scan_results: &[ScanResult],
        current_network: Option<&NetworkConfig>,
        current_bssid: Option<&str>,
        connected: bool,
        untrusted_allowed: bool,
        connectable: &mut Vec<ConnectableNetwork>,
    ) -> Option<NetworkConfig>;
}

/// Associate a scan result with at most one saved configuration by SSID and
/// key-management class. Passpoint configurations match EAP-capable APs.
pub(crate) fn saved_network_for_result(
    store: &dyn ConfigStore,
    result: &ScanResult,
) -> Option<NetworkConfig> {
    use crate::model::Security;
    let scan_security = Security::from_capabilities(&result.capabilities);
    store.get_saved_networks().into_iter().find(|network| {
        network.ssid == result.ssid
            && (network.security == scan_security
                || (network.security == Security::Passpoint && scan_security == Security::Eap))
    })
}

#[derive(Debug, Default)]
struct BssidBlacklistEntry {
    counter: u32,
    is_blacklisted: bool,
    blacklisted_time_millis: i64,
}

/// Picks the network to join or roam to.
pub struct NetworkSelector {
    scoring: ScoringConfig,
    policy: SelectionConfig,
    clock: Arc<dyn Clock>,
    evaluators: [Option<Box<dyn NetworkEvaluator>>; EVALUATOR_MIN_PRIORITY],
    bssid_blacklist: HashMap<String, BssidBlacklistEntry>,
    last_selection_millis: Option<i64>,
    connectable_networks: Vec<ConnectableNetwork>,
}

impl NetworkSelector {
    pub fn new(scoring: ScoringConfig, policy: SelectionConfig, clock: Arc<dyn Clock>) -> Self {
        NetworkSelector {
            scoring,
            policy,
            clock,
            evaluators: Default::default(),
            bssid_blacklist: HashMap::new(),
            last_selection_millis: None,
            connectable_networks: Vec::new(),
        }
    }

    /// Register an evaluator at `priority` (0 = highest). Fails when the
    /// priority is out of range or the slot is taken.
    pub fn register_evaluator(
        &mut self,
        evaluator: Box<dyn NetworkEvaluator>,
        priority: usize,
    ) -> bool {
        if priority >= EVALUATOR_MIN_PRIORITY {
            warn!("Invalid network evaluator priority: {priority}");
            return false;
        }
        if let Some(existing) = &self.evaluators[priority] {
            warn!(
                "Priority {priority} is already registered by {}",
                existing.name()
            );
            return false;
        }
        self.evaluators[priority] = Some(evaluator);
        true
    }

    /// Scan results paired with configurations by the last pass, for the
    /// available-networks tracker.
    pub fn connectable_networks(&self) -> &[ConnectableNetwork] {
        &self.connectable_networks
    }

    fn is_current_network_sufficient(
        &self,
        store: &dyn ConfigStore,
        link: &LinkInfo,
    ) -> bool {
        let network = match link.network_id.and_then(|id| store.get_configured_network(id)) {
            Some(network) => network,
            None => {
                debug!("No current connected network");
                return false;
            }
        };

        if network.ephemeral {
            debug!("Current network {} is ephemeral", network.network_string());
            return false;
        }
        if network.is_open() {
            debug!("Current network {} is open", network.network_string());
            return false;
        }
        if link.is_24ghz() {
            debug!("Current network {} is 2.4GHz", network.network_string());
            return false;
        }
        if link.rssi < self.scoring.qualified_rssi_5ghz {
            debug!(
                "Current network {} RSSI {} acceptable but not qualified",
                network.network_string(),
                link.rssi
            );
            return false;
        }
        true
    }

    fn is_selection_needed(
        &self,
        store: &dyn ConfigStore,
        link: &LinkInfo,
        connected: bool,
        disconnected: bool,
    ) -> bool {
        if connected {
            if !self.policy.enable_auto_join_when_associated {
                debug!("Switching networks while associated is not allowed");
                return false;
            }
            if let Some(last) = self.last_selection_millis {
                let gap = self.clock.elapsed_millis() - last;
                if gap < MINIMUM_NETWORK_SELECTION_INTERVAL_MS {
                    debug!("Too short since last selection ({gap} ms)");
                    return false;
                }
            }
            !self.is_current_network_sufficient(store, link)
        } else if disconnected {
            true
        } else {
            // Neither connected nor disconnected: the link is mid-transition.
            debug!("Link is transitioning, skipping network selection");
            false
        }
    }

    fn is_bssid_disabled(&self, bssid: &str) -> bool {
        self.bssid_blacklist
            .get(bssid)
            .map(|e| e.is_blacklisted)
            .unwrap_or(false)
    }

    /// Record a rejection (`enable == false`) or clear an entry
    /// (`enable == true`). Returns true exactly when the call crossed the
    /// blacklist threshold, or, for enable, when an entry actually existed.
    pub fn enable_bssid_for_network_selection(&mut self, bssid: &str, enable: bool) -> bool {
        if enable {
            return self.bssid_blacklist.remove(bssid).is_some();
        }
        let entry = self.bssid_blacklist.entry(bssid.to_owned()).or_default();
        if !entry.is_blacklisted {
            entry.counter += 1;
            if entry.counter >= BSSID_BLACKLIST_THRESHOLD {
                entry.is_blacklisted = true;
                entry.blacklisted_time_millis = self.clock.elapsed_millis();
                info!("Blacklisted BSSID {bssid}");
                return true;
            }
        }
        false
    }

    /// Drop entries whose blacklist period has expired. Runs before
    /// filtering so an expiring entry never filters a result in the same
    /// pass.
    fn update_bssid_blacklist(&mut self) {
        let now = self.clock.elapsed_millis();
        self.bssid_blacklist.retain(|bssid, entry| {
            let expired = entry.is_blacklisted
                && now - entry.blacklisted_time_millis >= BSSID_BLACKLIST_EXPIRE_TIME_MS;
            if expired {
                debug!("BSSID {bssid} freed from the blacklist");
            }
            !expired
        });
    }

    fn filter_scan_results(
        &self,
        scan_results: &[ScanResult],
        connected: bool,
        current_bssid: Option<&str>,
    ) -> Vec<ScanResult> {
        let mut valid = Vec::new();
        let mut have_current_bssid = false;

        for result in scan_results {
            if result.ssid.is_empty() {
                debug!("Filtered out {} for invalid SSID", result.bssid);
                continue;
            }
            if Some(result.bssid.as_str()) == current_bssid {
                have_current_bssid = true;
            }
            if self.is_bssid_disabled(&result.bssid) {
                debug!("Filtered out {} (blacklisted)", result.scan_id());
                continue;
            }
            if result.rssi < self.scoring.min_rssi(result.is_24ghz()) {
                debug!(
                    "Filtered out {} for low signal ({})",
                    result.scan_id(),
                    result.rssi
                );
                continue;
            }
            valid.push(result.clone());
        }

        // Some scans do not cover the channel of the current network, so it
        // will be missing from the batch. Acting on those batches would churn
        // the association, so the whole batch is dropped.
        if connected && !have_current_bssid {
            info!(
                "Current BSSID {:?} is not in the scan results, skipping selection",
                current_bssid
            );
            return Vec::new();
        }
        valid
    }

    /// Run one selection pass. Returns the configuration to connect or roam
    /// to, or `None` if no change should be made.
    pub fn select_network(
        &mut self,
        store: &mut dyn ConfigStore,
        scan_results: &[ScanResult],
        link: &LinkInfo,
        connected: bool,
        disconnected: bool,
        untrusted_allowed: bool,
    ) -> Option<NetworkConfig> {
        self.connectable_networks.clear();
        if scan_results.is_empty() {
            debug!("Empty connectivity scan result");
            return None;
        }

        let current_network = link
            .network_id
            .and_then(|id| store.get_configured_network(id));
        // The BSSID comes from the link snapshot in case the firmware roamed
        // on its own.
        let current_bssid = link.bssid.as_deref().map(str::to_owned);

        if !self.is_selection_needed(store, link, connected, disconnected) {
            return None;
        }

        for evaluator in self.evaluators.iter_mut().flatten() {
            evaluator.update(store, scan_results);
        }

        self.update_bssid_blacklist();

        let filtered =
            self.filter_scan_results(scan_results, connected, current_bssid.as_deref());
        if filtered.is_empty() {
            return None;
        }

        let mut selected = None;
        for evaluator in self.evaluators.iter_mut().flatten() {
            selected = evaluator.evaluate_networks(
                store,
                &filtered,
                current_network.as_ref(),
                current_bssid.as_deref(),
                connected,
                untrusted_allowed,
                &mut self.connectable_networks,
            );
            if let Some(network) = &selected {
                info!(
                    "Network selection by {}: {}",
                    evaluator.name(),
                    network.network_string()
                );
                break;
            }
        }

        if selected.is_some() {
            self.last_selection_millis = Some(self.clock.elapsed_millis());
            metrics::counter!("autojoin_network_selections").increment(1);
        }
        selected
    }

    /// The user explicitly picked `network_id`: re-enable it if disabled and
    /// stamp a "preferred over" link onto every other saved network that was
    /// visible in the last pass. Returns whether any link changed.
    pub fn set_user_connect_choice(
        &mut self,
        store: &mut dyn ConfigStore,
        network_id: NetworkId,
    ) -> bool {
        info!("User selected network ID {network_id}");
        let selected = match store.get_configured_network(network_id) {
            Some(config) => config,
            None => {
                warn!("User selection of unknown network ID {network_id}");
                return false;
            }
        };

        if !selected.status.is_enabled() {
            // An explicit user pick overrides any disable reason, including
            // permanent ones.
            store.enable_network(network_id);
        }
        store.set_last_selected_network(network_id, self.clock.elapsed_millis());

        let key = selected.config_key();
        let now = self.clock.wall_clock_millis();
        let mut change = false;
        for network in store.get_saved_networks() {
            if network.network_id == selected.network_id {
                if network.status.connect_choice.is_some() {
                    store.clear_network_connect_choice(network.network_id);
                    change = true;
                }
                continue;
            }
            if network.status.seen_in_last_selection
                && network.status.connect_choice.as_deref() != Some(key.as_str())
            {
                debug!(
                    "Preferring {} over {}",
                    key,
                    network.network_string()
                );
                store.set_network_connect_choice(network.network_id, &key, now);
                change = true;
            }
        }
        change
    }
}
