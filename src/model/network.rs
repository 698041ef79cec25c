//! Saved / ephemeral network descriptors and their per-pass selection state.
//!
//! `NetworkConfig` instances are owned by the configuration store; the core
//! receives clones and mutates selection state only through the store's
//! interface operations.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::scan::ScanResult;

/// Numeric identifier assigned to a configuration by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub i32);

impl NetworkId {
    pub const INVALID: NetworkId = NetworkId(-1);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key management distilled to the classes the selector cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Security {
    Open,
    Wep,
    Psk,
    Eap,
    Passpoint,
}

impl Security {
    pub fn is_open(self) -> bool {
        self == Security::Open
    }

    /// Best-effort classification from an AP capability string.
    pub fn from_capabilities(capabilities: &str) -> Security {
        if capabilities.contains("EAP") {
            Security::Eap
        } else if capabilities.contains("PSK") {
            Security::Psk
        } else if capabilities.contains("WEP") {
            Security::Wep
        } else {
            Security::Open
        }
    }
}

/// Why a network was disabled for selection. Temporary reasons are cleared
/// by the store's `try_enable_network`; permanent ones require an explicit
/// user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisableReason {
    AssociationRejection,
    AuthenticationFailure,
    DhcpFailure,
    NoInternetPermanent,
    ByWifiManager,
}

impl DisableReason {
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            DisableReason::NoInternetPermanent | DisableReason::ByWifiManager
        )
    }
}

/// Per-configuration selection state. Reset at the start of every evaluation
/// pass and updated at most once per scan result with the best-scoring
/// observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionStatus {
    /// `None` when the network is enabled for selection.
    pub disabled_reason: Option<DisableReason>,
    /// Rolling count of disable events per reason, for diagnostics.
    pub disable_counters: Vec<(DisableReason, u32)>,
    /// Best scan result seen for this network in the current pass.
    pub candidate: Option<ScanResult>,
    /// Score attached to `candidate`. `None` until a candidate is recorded.
    pub candidate_score: Option<i32>,
    /// Whether this network was visible in the latest selection pass.
    pub seen_in_last_selection: bool,
    /// Config key of the network the user preferred over this one.
    pub connect_choice: Option<String>,
    /// Wall-clock millis when the connect choice was stamped.
    pub connect_choice_timestamp: i64,
}

impl SelectionStatus {
    pub fn is_enabled(&self) -> bool {
        self.disabled_reason.is_none()
    }

    pub fn clear_candidate(&mut self) {
        self.candidate = None;
        self.candidate_score = None;
        self.seen_in_last_selection = false;
    }

    pub fn bump_disable_counter(&mut self, reason: DisableReason) {
        for (r, n) in self.disable_counters.iter_mut() {
            if *r == reason {
                *n += 1;
                return;
            }
        }
        self.disable_counters.push((reason, 1));
    }
}

/// A saved or ephemeral network descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network_id: NetworkId,
    pub ssid: String,
    /// When set, only scan results from this exact BSSID may be candidates.
    pub bssid: Option<String>,
    pub security: Security,
    /// Auto-created, never persisted (e.g. externally scored open networks).
    pub ephemeral: bool,
    /// Defer scoring of this network to the external score evaluator.
    pub use_external_scores: bool,
    pub metered_hint: bool,
    /// Networks sharing credentials with this one (roam targets).
    pub linked: BTreeSet<NetworkId>,
    /// Times the platform reported this network had no internet access.
    pub no_internet_reports: u32,
    pub validated_internet: bool,
    pub status: SelectionStatus,
}

impl NetworkConfig {
    pub fn new(network_id: NetworkId, ssid: &str, security: Security) -> Self {
        NetworkConfig {
            network_id,
            ssid: ssid.to_owned(),
            bssid: None,
            security,
            ephemeral: false,
            use_external_scores: false,
            metered_hint: false,
            linked: BTreeSet::new(),
            no_internet_reports: 0,
            validated_internet: false,
            status: SelectionStatus::default(),
        }
    }

    /// Synthesize an ephemeral configuration from a scan result, used when an
    /// externally scored network without a saved configuration is chosen.
    pub fn from_scan_result(result: &ScanResult) -> Self {
        let mut config = NetworkConfig::new(
            NetworkId::INVALID,
            &result.ssid,
            Security::from_capabilities(&result.capabilities),
        );
        config.ephemeral = true;
        config
    }

    /// Stable identity used for connect-choice links: same SSID and security
    /// class means same logical network.
    pub fn config_key(&self) -> String {
        format!("{}-{:?}", self.ssid, self.security)
    }

    pub fn is_open(&self) -> bool {
        self.security.is_open()
    }

    pub fn is_passpoint(&self) -> bool {
        self.security == Security::Passpoint
    }

    pub fn is_linked(&self, other: &NetworkConfig) -> bool {
        self.linked.contains(&other.network_id) || other.linked.contains(&self.network_id)
    }

    /// `ssid:id` string used in log lines.
    pub fn network_string(&self) -> String {
        format!("{}:{}", self.ssid, self.network_id)
    }
}
