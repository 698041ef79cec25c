//! Evaluator for externally scored networks.
//!
//! Scores come from an out-of-process recommendation service through the
//! [`ScoreCache`]. Two candidate types compete: untrusted networks with no
//! real saved configuration, and saved networks explicitly deferring to
//! external scores. On an exact score tie the saved type wins.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::model::{NetworkConfig, ScanResult};
use crate::platform::{ConfigStore, NetworkScoreKey, ScoreCache, INVALID_NETWORK_SCORE};

use super::{saved_network_for_result, ConnectableNetwork, NetworkEvaluator};

/// The best externally scored candidate seen so far in a pass.
enum BestCandidate {
    None,
    /// Untrusted: no saved configuration yet; one is synthesized on win.
    Untrusted { result: ScanResult },
    /// A saved network flagged to use external scores.
    Saved {
        result: ScanResult,
        config: NetworkConfig,
    },
}

struct ScoreTracker {
    best: BestCandidate,
    high_score: i32,
}

impl ScoreTracker {
    fn new() -> Self {
        ScoreTracker {
            best: BestCandidate::None,
            high_score: INVALID_NETWORK_SCORE,
        }
    }

    fn track_untrusted_candidate(&mut self, score: Option<i32>, result: &ScanResult) {
        if let Some(score) = score {
            if score > self.high_score {
                self.high_score = score;
                debug!("{} becomes the new untrusted candidate", result.scan_id());
                self.best = BestCandidate::Untrusted {
                    result: result.clone(),
                };
            }
        }
    }

    fn track_saved_candidate(
        &mut self,
        score: Option<i32>,
        config: &NetworkConfig,
        result: &ScanResult,
    ) {
        // Take the highest score; when an untrusted candidate ties, prefer
        // the saved network.
        let tie_with_untrusted = matches!(self.best, BestCandidate::Untrusted { .. });
        if let Some(score) = score {
            if score > self.high_score || (tie_with_untrusted && score == self.high_score) {
                self.high_score = score;
                debug!(
                    "{} becomes the new externally scored saved candidate",
                    result.scan_id()
                );
                self.best = BestCandidate::Saved {
                    result: result.clone(),
                    config: config.clone(),
                };
            }
        }
    }
}

pub struct ExternalScoreEvaluator {
    score_cache: Arc<dyn ScoreCache>,
}

impl ExternalScoreEvaluator {
    pub fn new(score_cache: Arc<dyn ScoreCache>) -> Self {
        ExternalScoreEvaluator { score_cache }
    }

    fn network_score(&self, result: &ScanResult, active: bool) -> Option<i32> {
        if !self.score_cache.is_scored_network(result) {
            return None;
        }
        let score = self.score_cache.get_network_score(result, active);
        if let Some(score) = score {
            debug!(
                "{} has score {score}, active: {active}",
                result.scan_id()
            );
        }
        score
    }

    /// Resolve the tracker into a stored configuration. Untrusted winners get
    /// an ephemeral configuration registered with the store first; if that
    /// registration fails the candidate is dropped for this pass.
    fn external_score_candidate(
        &self,
        store: &mut dyn ConfigStore,
        tracker: ScoreTracker,
    ) -> Option<NetworkConfig> {
        match tracker.best {
            BestCandidate::Untrusted { result } => {
                let mut untrusted = NetworkConfig::from_scan_result(&result);
                untrusted.metered_hint = self.score_cache.get_metered_hint(&result);
                untrusted.use_external_scores = true;
                let metered = untrusted.metered_hint;
                match store.add_or_update_network(untrusted) {
                    Ok(id) => {
                        store.set_network_candidate_scan_result(id, &result, 0);
                        info!(
                            "New ephemeral candidate {} network ID {id}, metered: {metered}",
                            result.scan_id()
                        );
                        store.get_configured_network(id)
                    }
                    Err(err) => {
                        warn!("Failed to add ephemeral network: {err}");
                        None
                    }
                }
            }
            BestCandidate::Saved { result, config } => {
                store.set_network_candidate_scan_result(config.network_id, &result, 0);
                info!(
                    "New externally scored saved candidate {} network ID {}",
                    result.scan_id(),
                    config.network_id
                );
                store.get_configured_network(config.network_id)
            }
            BestCandidate::None => {
                debug!("Did not see any good externally scored candidates");
                None
            }
        }
    }
}

impl NetworkEvaluator for ExternalScoreEvaluator {
    fn name(&self) -> &'static str {
        "ExternalScoreEvaluator"
    }

    /// Request fresh scores for every result the cache has never seen.
    fn update(&mut self, _store: &mut dyn ConfigStore, scan_results: &[ScanResult]) {
        let unscored: Vec<NetworkScoreKey> = scan_results
            .iter()
            .filter(|r| !self.score_cache.is_scored_network(r))
            .map(NetworkScoreKey::from_scan_result)
            .collect();
        if !unscored.is_empty() {
            self.score_cache.request_scores(&unscored);
        }
    }

    fn evaluate_networks(
        &mut self,
        store: &mut dyn ConfigStore,
        scan_results: &[ScanResult],
        current_network: Option<&NetworkConfig>,
        current_bssid: Option<&str>,
        _connected: bool,
        untrusted_allowed: bool,
        connectable: &mut Vec<ConnectableNetwork>,
    ) -> Option<NetworkConfig> {
        let mut tracker = ScoreTracker::new();

        for result in scan_results {
            let associated = saved_network_for_result(store, result);

            if is_potential_ephemeral(&associated) {
                if untrusted_allowed {
                    // A deleted ephemeral network is never auto-created again.
                    if store.was_ephemeral_network_deleted(&result.ssid) {
                        debug!("Ignoring deleted ephemeral {}", result.scan_id());
                        continue;
                    }
                    // An ephemeral network has one configuration or none, so
                    // matching the BSSID is enough to detect the active one.
                    let active = current_bssid == Some(result.bssid.as_str());
                    let score = self.network_score(result, active);
                    tracker.track_untrusted_candidate(score, result);
                    connectable.push(ConnectableNetwork {
                        scan_result: result.clone(),
                        config: associated.clone(),
                    });
                }
                continue;
            }

            let network = match associated {
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

            if network.use_external_scores {
                let active = current_network
                    .map(|c| c.network_id == network.network_id)
                    .unwrap_or(false)
                    && current_bssid == Some(result.bssid.as_str());
                let score = self.network_score(result, active);
                tracker.track_saved_candidate(score, &network, result);
                connectable.push(ConnectableNetwork {
                    scan_result: result.clone(),
                    config: Some(network),
                });
            }
        }

        let candidate = self.external_score_candidate(store, tracker)?;
        // A candidate without a backing scan result cannot be connected.
        if candidate.status.candidate.is_some() {
            Some(candidate)
        } else {
            None
        }
    }
}

/// No saved configuration, or exactly one that is itself ephemeral.
fn is_potential_ephemeral(associated: &Option<NetworkConfig>) -> bool {
    match associated {
        None => true,
        Some(network) => network.ephemeral,
    }
}
