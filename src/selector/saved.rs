//! Composite-score evaluator for saved networks.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};

use crate::config::model::ScoringConfig;
use crate::model::{NetworkConfig, ScanResult};
use crate::platform::{Clock, ConfigStore};

use super::{saved_network_for_result, ConnectableNetwork, NetworkEvaluator};

/// Scores every (scan result, saved configuration) pair and nominates the
/// best, then lets explicit user preferences override the score order.
pub struct SavedNetworkEvaluator {
    scoring: ScoringConfig,
    clock: Arc<dyn Clock>,
}

impl SavedNetworkEvaluator {
    pub fn new(scoring: ScoringConfig, clock: Arc<dyn Clock>) -> Self {
        SavedNetworkEvaluator { scoring, clock }
    }

    fn calculate_bssid_score(
        &self,
        store: &dyn ConfigStore,
        result: &ScanResult,
        network: &NetworkConfig,
        current_network: Option<&NetworkConfig>,
        current_bssid: Option<&str>,
    ) -> i32 {
        let s = &self.scoring;
        let mut score = 0;

        let rssi = result.rssi.min(s.saturated_rssi(result.is_24ghz()));
        score += (rssi + s.rssi_score_offset) * s.rssi_score_slope;

        if result.is_5ghz() {
            score += s.band_5ghz_award;
        }

        // Award for the network the user picked last, decaying by one point
        // per elapsed minute.
        if store.get_last_selected_network() == Some(network.network_id) {
            let elapsed = self.clock.elapsed_millis() - store.get_last_selected_timestamp();
            if elapsed > 0 {
                let bonus = s.last_selection_award - (elapsed / 1000 / 60) as i32;
                if bonus > 0 {
                    score += bonus;
                }
            }
        }

        if let Some(current) = current_network {
            if network.network_id == current.network_id || network.is_linked(current) {
                score += s.same_network_award;
            }
        }

        if current_bssid == Some(result.bssid.as_str()) {
            score += s.same_bssid_award;
        }

        if network.is_passpoint() {
            score += s.passpoint_security_award;
        } else if !network.is_open() {
            score += s.security_award;
        }

        if network.no_internet_reports > 0 && !network.validated_internet {
            score -= s.no_internet_penalty();
        }

        debug!(
            "Score for {} via {}: {}",
            network.network_string(),
            result.bssid,
            score
        );
        score
    }

    /// Walk the chain of user "preferred over" links starting at `candidate`
    /// and return the final preference. Links into disabled or unseen
    /// networks are skipped; a cycle stops the walk at the last good hop.
    fn adjust_candidate_with_user_selection(
        &self,
        store: &dyn ConfigStore,
        mut candidate: NetworkConfig,
    ) -> NetworkConfig {
        let mut cursor = candidate.clone();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(cursor.config_key());

        while let Some(key) = cursor.status.connect_choice.clone() {
            if !visited.insert(key.clone()) {
                warn!(
                    "Connect choice chain loops back to {key}, stopping at {}",
                    candidate.network_string()
                );
                break;
            }
            match store.get_configured_network_for_key(&key) {
                Some(next) => {
                    if next.status.candidate.is_some() && next.status.is_enabled() {
                        candidate = next.clone();
                    }
                    cursor = next;
                }
                None => {
                    debug!("Connect choice {key} has no corresponding saved config");
                    break;
                }
            }
        }
        candidate
    }
}

impl NetworkEvaluator for SavedNetworkEvaluator {
    fn name(&self) -> &'static str {
        "SavedNetworkEvaluator"
    }

    /// Pass reset: give temporarily disabled networks their chance back and
    /// drop candidate state left over from the previous pass.
    fn update(&mut self, store: &mut dyn ConfigStore, _scan_results: &[ScanResult]) {
        for network in store.get_saved_networks() {
            store.try_enable_network(network.network_id);
            store.clear_network_candidate_scan_result(network.network_id);
            debug!("Saved network {}", network.network_string());
        }
    }

    fn evaluate_networks(
        &mut self,
        store: &mut dyn ConfigStore,
        scan_results: &[ScanResult],
        current_network: Option<&NetworkConfig>,
        current_bssid: Option<&str>,
        _connected: bool,
        _untrusted_allowed: bool,
        connectable: &mut Vec<ConnectableNetwork>,
    ) -> Option<NetworkConfig> {
        let mut highest_score = i32::MIN;
        let mut result_candidate: Option<ScanResult> = None;
        let mut candidate: Option<NetworkConfig> = None;

        for result in scan_results {
            let network = match saved_network_for_result(store, result) {
                Some(network) => network,
                None => continue,
            };

            store.set_seen_in_last_selection(network.network_id, true);

            if !network.status.is_enabled() {
                continue;
            }
            if let Some(pinned) = &network.bssid {
                if pinned != "any" && pinned != &result.bssid {
                    debug!(
                        "Network {} is pinned to BSSID {pinned}, skipping {}",
                        network.network_string(),
                        result.bssid
                    );
                    continue;
                }
            }
            // Externally scored networks belong to the other evaluator.
            if network.use_external_scores {
                debug!("Network {} has external score", network.network_string());
                continue;
            }

            let score =
                self.calculate_bssid_score(store, result, &network, current_network, current_bssid);

            let beats_stored = match network.status.candidate_score {
                None => true,
                Some(stored) => {
                    score > stored
                        || (score == stored
                            && network
                                .status
                                .candidate
                                .as_ref()
                                .map(|c| result.rssi > c.rssi)
                                .unwrap_or(false))
                }
            };
            if beats_stored {
                store.set_network_candidate_scan_result(network.network_id, result, score);
            }

            connectable.push(ConnectableNetwork {
                scan_result: result.clone(),
                config: Some(network.clone()),
            });

            let beats_global = score > highest_score
                || (score == highest_score
                    && result_candidate
                        .as_ref()
                        .map(|c| result.rssi > c.rssi)
                        .unwrap_or(false));
            if beats_global {
                highest_score = score;
                result_candidate = Some(result.clone());
                store.set_network_candidate_scan_result(network.network_id, result, score);
                // Reload the configuration with the updated candidate info.
                candidate = store.get_configured_network(network.network_id);
            }
        }

        match (candidate, result_candidate) {
            (Some(candidate), Some(_)) => {
                Some(self.adjust_candidate_with_user_selection(store, candidate))
            }
            _ => {
                debug!("Did not see any good saved network candidates");
                None
            }
        }
    }
}
