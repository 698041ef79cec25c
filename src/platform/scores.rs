//! External network score cache.
//!
//! Scores are produced by an external recommendation service and cached per
//! (SSID, BSSID). The cache answers synchronously; `request_scores` only
//! kicks off a refresh for results the cache has never seen.

use crate::model::ScanResult;

/// Sentinel below any real score; used to seed best-score searches.
pub const INVALID_NETWORK_SCORE: i32 = -128;

/// Identity of a scored AP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkScoreKey {
    pub ssid: String,
    pub bssid: String,
}

impl NetworkScoreKey {
    pub fn from_scan_result(result: &ScanResult) -> Self {
        NetworkScoreKey {
            ssid: result.ssid.clone(),
            bssid: result.bssid.clone(),
        }
    }
}

/// Read side of the external score cache.
pub trait ScoreCache: Send + Sync {
    /// Whether the cache holds any score entry for this AP.
    fn is_scored_network(&self, result: &ScanResult) -> bool;
    /// Cached score, or `None` when unknown.
    fn get_network_score(&self, result: &ScanResult, active: bool) -> Option<i32>;
    /// Whether the scorer flagged this AP as metered.
    fn get_metered_hint(&self, result: &ScanResult) -> bool;
    /// Ask the scorer for fresh scores for the given APs.
    fn request_scores(&self, keys: &[NetworkScoreKey]);
}
