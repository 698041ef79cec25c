//! Simulated radio platform for running the daemon on a plain host.
//!
//! Scan requests are answered from a fixed set of synthetic access points,
//! so the whole control loop can be exercised end to end without hardware.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

use autojoin::config::Config;
use autojoin::connectivity::manager::Platform;
use autojoin::events::Event;
use autojoin::model::{NetworkConfig, NetworkId, ScanBatch, ScanResult};
use autojoin::platform::{
    LinkInfo, LinkLayer, MemoryConfigStore, NetworkScoreKey, PnoSettings, ScanBand, ScanSettings,
    ScanSource, ScoreCache, SystemClock, TokioAlarmService, WifiScanner,
};
use autojoin::selector::{ExternalScoreEvaluator, NetworkSelector};

/// The synthetic radio environment: what any scan can see.
fn environment() -> Vec<ScanResult> {
    vec![
        ScanResult {
            ssid: "HomeNetwork".into(),
            bssid: "6c:f3:7f:ae:8c:f3".into(),
            rssi: -58,
            frequency: 5180,
            capabilities: "[WPA2-PSK-CCMP][ESS]".into(),
            timestamp_micros: 0,
        },
        ScanResult {
            ssid: "HomeNetwork".into(),
            bssid: "6c:f3:7f:ae:8c:f4".into(),
            rssi: -66,
            frequency: 2437,
            capabilities: "[WPA2-PSK-CCMP][ESS]".into(),
            timestamp_micros: 0,
        },
        ScanResult {
            ssid: "CoffeeShop".into(),
            bssid: "00:25:9c:4b:12:01".into(),
            rssi: -72,
            frequency: 2412,
            capabilities: "[ESS]".into(),
            timestamp_micros: 0,
        },
    ]
}

/// Scanner that answers every request from the synthetic environment.
pub struct SimulatedScanner {
    events: UnboundedSender<Event>,
    listener_registered: bool,
}

impl SimulatedScanner {
    pub fn new(events: UnboundedSender<Event>) -> Self {
        SimulatedScanner {
            events,
            listener_registered: false,
        }
    }

    fn visible(&self, settings: &ScanSettings) -> Vec<ScanResult> {
        environment()
            .into_iter()
            .filter(|r| {
                settings.band == ScanBand::BothWithDfs || settings.channels.contains(&r.frequency)
            })
            .collect()
    }
}

impl WifiScanner for SimulatedScanner {
    fn register_all_single_scans_listener(&mut self) {
        self.listener_registered = true;
    }

    fn start_scan(&mut self, settings: ScanSettings, source: ScanSource) {
        debug!("Simulated scan: band={:?} source={source:?}", settings.band);
        let results = self.visible(&settings);
        self.events.send(Event::ScanSuccess { source }).ok();

        // Every single scan is also visible to the all-scans listener.
        if self.listener_registered {
            for result in &results {
                self.events
                    .send(Event::ScanResult {
                        source: ScanSource::AllSingle,
                        result: result.clone(),
                    })
                    .ok();
            }
            self.events
                .send(Event::ScanBatch {
                    source: ScanSource::AllSingle,
                    batch: ScanBatch {
                        results: results.clone(),
                        all_channels_scanned: settings.band == ScanBand::BothWithDfs,
                    },
                })
                .ok();
        }
    }

    fn start_disconnected_pno_scan(&mut self, _scan: ScanSettings, pno: PnoSettings) {
        let matches: Vec<ScanResult> = environment()
            .into_iter()
            .filter(|r| pno.networks.iter().any(|n| n.ssid == r.ssid))
            .filter(|r| {
                r.rssi
                    >= if r.is_24ghz() {
                        pno.min_rssi_24ghz
                    } else {
                        pno.min_rssi_5ghz
                    }
            })
            .collect();
        if !matches.is_empty() {
            self.events
                .send(Event::PnoNetworkFound { results: matches })
                .ok();
        }
    }

    fn stop_pno_scan(&mut self) {
        debug!("Simulated PNO scan stopped");
    }
}

/// Link layer that never associates; connect requests are only logged.
#[derive(Default)]
pub struct SimulatedLink;

impl LinkLayer for SimulatedLink {
    fn is_connected(&self) -> bool {
        false
    }

    fn is_disconnected(&self) -> bool {
        true
    }

    fn is_link_debouncing(&self) -> bool {
        false
    }

    fn is_supplicant_transient(&self) -> bool {
        false
    }

    fn link_info(&self) -> LinkInfo {
        LinkInfo::default()
    }

    fn get_current_configuration(&self) -> Option<NetworkConfig> {
        None
    }

    fn start_roam_to_network(&mut self, network_id: NetworkId, bssid: &str) {
        info!("Simulated roam to network {network_id} at {bssid}");
    }

    fn start_connect_to_network(&mut self, network_id: NetworkId, bssid: &str) {
        info!("Simulated connect to network {network_id} at {bssid}");
    }
}

/// Score cache with a fixed score table and no backing service.
pub struct StaticScoreCache {
    scores: HashMap<(String, String), i32>,
}

impl StaticScoreCache {
    pub fn empty() -> Arc<Self> {
        Arc::new(StaticScoreCache {
            scores: HashMap::new(),
        })
    }
}

impl ScoreCache for StaticScoreCache {
    fn is_scored_network(&self, result: &ScanResult) -> bool {
        self.scores
            .contains_key(&(result.ssid.clone(), result.bssid.clone()))
    }

    fn get_network_score(&self, result: &ScanResult, _active: bool) -> Option<i32> {
        self.scores
            .get(&(result.ssid.clone(), result.bssid.clone()))
            .copied()
    }

    fn get_metered_hint(&self, _result: &ScanResult) -> bool {
        false
    }

    fn request_scores(&self, keys: &[NetworkScoreKey]) {
        debug!("Score refresh requested for {} networks", keys.len());
    }
}

/// Assemble the selector and the simulated platform around one event sender.
pub fn build_platform(
    config: &Config,
    store: MemoryConfigStore,
    events: UnboundedSender<Event>,
) -> (NetworkSelector, Platform) {
    let clock = SystemClock::new();
    let selector = NetworkSelector::new(
        config.scoring.clone(),
        config.selection.clone(),
        clock.clone(),
    );
    let platform = Platform {
        store: Box::new(store),
        scanner: Box::new(SimulatedScanner::new(events.clone())),
        link: Box::new(SimulatedLink::default()),
        alarms: Box::new(TokioAlarmService::new(events)),
        clock,
    };
    (selector, platform)
}

pub fn external_score_evaluator() -> ExternalScoreEvaluator {
    ExternalScoreEvaluator::new(StaticScoreCache::empty())
}
