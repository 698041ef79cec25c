//! Shared fakes for the integration tests.
//!
//! Every platform collaborator gets a hand-built fake with a shared handle,
//! so tests keep a view into state that the manager owns exclusively.

// Not every test binary uses every fake.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autojoin::events::AlarmTag;
use autojoin::model::{DisableReason, NetworkConfig, NetworkId, ScanResult, Security};
use autojoin::platform::{
    AlarmService, Clock, ConfigStore, HiddenNetwork, LinkInfo, LinkLayer, MemoryConfigStore,
    NetworkScoreKey, PnoNetwork, PnoSettings, ScanSettings, ScanSource, ScoreCache, StoreError,
    WifiScanner,
};

// ───── clock ────────────────────────────────────────────────────────────────

pub struct TestClock {
    now: AtomicI64,
}

impl TestClock {
    pub fn new() -> Arc<Self> {
        Arc::new(TestClock {
            now: AtomicI64::new(0),
        })
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn elapsed_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn wall_clock_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ───── configuration store ──────────────────────────────────────────────────

/// In-memory store behind a shared handle, so tests can inspect and seed it
/// while the manager owns the `Box<dyn ConfigStore>` side.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<MemoryConfigStore>>);

impl SharedStore {
    pub fn new() -> Self {
        SharedStore(Arc::new(Mutex::new(MemoryConfigStore::new())))
    }

    pub fn insert(&self, config: NetworkConfig) -> NetworkId {
        self.0.lock().unwrap().insert(config)
    }

    pub fn network(&self, id: NetworkId) -> Option<NetworkConfig> {
        self.0.lock().unwrap().get_configured_network(id)
    }
}

impl ConfigStore for SharedStore {
    fn get_configured_network(&self, id: NetworkId) -> Option<NetworkConfig> {
        self.0.lock().unwrap().get_configured_network(id)
    }

    fn get_configured_network_for_key(&self, key: &str) -> Option<NetworkConfig> {
        self.0.lock().unwrap().get_configured_network_for_key(key)
    }

    fn get_saved_networks(&self) -> Vec<NetworkConfig> {
        self.0.lock().unwrap().get_saved_networks()
    }

    fn set_network_candidate_scan_result(&mut self, id: NetworkId, result: &ScanResult, score: i32) {
        self.0
            .lock()
            .unwrap()
            .set_network_candidate_scan_result(id, result, score)
    }

    fn clear_network_candidate_scan_result(&mut self, id: NetworkId) {
        self.0.lock().unwrap().clear_network_candidate_scan_result(id)
    }

    fn set_seen_in_last_selection(&mut self, id: NetworkId, seen: bool) {
        self.0.lock().unwrap().set_seen_in_last_selection(id, seen)
    }

    fn try_enable_network(&mut self, id: NetworkId) {
        self.0.lock().unwrap().try_enable_network(id)
    }

    fn enable_network(&mut self, id: NetworkId) {
        self.0.lock().unwrap().enable_network(id)
    }

    fn update_network_selection_status(&mut self, id: NetworkId, reason: DisableReason) {
        self.0
            .lock()
            .unwrap()
            .update_network_selection_status(id, reason)
    }

    fn set_network_connect_choice(&mut self, id: NetworkId, key: &str, timestamp_millis: i64) {
        self.0
            .lock()
            .unwrap()
            .set_network_connect_choice(id, key, timestamp_millis)
    }

    fn clear_network_connect_choice(&mut self, id: NetworkId) {
        self.0.lock().unwrap().clear_network_connect_choice(id)
    }

    fn get_last_selected_network(&self) -> Option<NetworkId> {
        self.0.lock().unwrap().get_last_selected_network()
    }

    fn get_last_selected_timestamp(&self) -> i64 {
        self.0.lock().unwrap().get_last_selected_timestamp()
    }

    fn set_last_selected_network(&mut self, id: NetworkId, timestamp_millis: i64) {
        self.0
            .lock()
            .unwrap()
            .set_last_selected_network(id, timestamp_millis)
    }

    fn fetch_channel_set_for_network(
        &self,
        id: NetworkId,
        max_age_millis: i64,
        current_frequency: u32,
    ) -> Option<BTreeSet<u32>> {
        self.0
            .lock()
            .unwrap()
            .fetch_channel_set_for_network(id, max_age_millis, current_frequency)
    }

    fn retrieve_hidden_network_list(&self) -> Vec<HiddenNetwork> {
        self.0.lock().unwrap().retrieve_hidden_network_list()
    }

    fn retrieve_pno_network_list(&self) -> Vec<PnoNetwork> {
        self.0.lock().unwrap().retrieve_pno_network_list()
    }

    fn was_ephemeral_network_deleted(&self, ssid: &str) -> bool {
        self.0.lock().unwrap().was_ephemeral_network_deleted(ssid)
    }

    fn add_or_update_network(&mut self, config: NetworkConfig) -> Result<NetworkId, StoreError> {
        self.0.lock().unwrap().add_or_update_network(config)
    }
}

// ───── scanner ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ScannerCall {
    RegisterListener,
    StartScan {
        full_band: bool,
        channels: Vec<u32>,
        source: ScanSource,
    },
    StartPno {
        interval_millis: i64,
        network_count: usize,
        initial_score_max: i32,
    },
    StopPno,
}

#[derive(Clone)]
pub struct MockScanner(pub Arc<Mutex<Vec<ScannerCall>>>);

impl MockScanner {
    pub fn new() -> Self {
        MockScanner(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn calls(&self) -> Vec<ScannerCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn scan_count(&self) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, ScannerCall::StartScan { .. }))
            .count()
    }

    pub fn pno_started(&self) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, ScannerCall::StartPno { .. }))
    }
}

impl WifiScanner for MockScanner {
    fn register_all_single_scans_listener(&mut self) {
        self.0.lock().unwrap().push(ScannerCall::RegisterListener);
    }

    fn start_scan(&mut self, settings: ScanSettings, source: ScanSource) {
        self.0.lock().unwrap().push(ScannerCall::StartScan {
            full_band: settings.band == autojoin::platform::ScanBand::BothWithDfs,
            channels: settings.channels,
            source,
        });
    }

    fn start_disconnected_pno_scan(&mut self, _scan: ScanSettings, pno: PnoSettings) {
        self.0.lock().unwrap().push(ScannerCall::StartPno {
            interval_millis: pno.interval_millis,
            network_count: pno.networks.len(),
            initial_score_max: pno.initial_score_max,
        });
    }

    fn stop_pno_scan(&mut self) {
        self.0.lock().unwrap().push(ScannerCall::StopPno);
    }
}

// ───── link layer ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct LinkState {
    pub connected: bool,
    pub debouncing: bool,
    pub transient: bool,
    pub info: LinkInfo,
    pub current: Option<NetworkConfig>,
    pub connects: Vec<(NetworkId, String)>,
    pub roams: Vec<(NetworkId, String)>,
}

#[derive(Clone)]
pub struct MockLink(pub Arc<Mutex<LinkState>>);

impl MockLink {
    pub fn new() -> Self {
        MockLink(Arc::new(Mutex::new(LinkState::default())))
    }

    pub fn connect_attempts(&self) -> usize {
        let state = self.0.lock().unwrap();
        state.connects.len() + state.roams.len()
    }
}

impl LinkLayer for MockLink {
    fn is_connected(&self) -> bool {
        self.0.lock().unwrap().connected
    }

    fn is_disconnected(&self) -> bool {
        !self.0.lock().unwrap().connected
    }

    fn is_link_debouncing(&self) -> bool {
        self.0.lock().unwrap().debouncing
    }

    fn is_supplicant_transient(&self) -> bool {
        self.0.lock().unwrap().transient
    }

    fn link_info(&self) -> LinkInfo {
        self.0.lock().unwrap().info.clone()
    }

    fn get_current_configuration(&self) -> Option<NetworkConfig> {
        self.0.lock().unwrap().current.clone()
    }

    fn start_roam_to_network(&mut self, network_id: NetworkId, bssid: &str) {
        self.0
            .lock()
            .unwrap()
            .roams
            .push((network_id, bssid.to_owned()));
    }

    fn start_connect_to_network(&mut self, network_id: NetworkId, bssid: &str) {
        self.0
            .lock()
            .unwrap()
            .connects
            .push((network_id, bssid.to_owned()));
    }
}

// ───── alarms ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AlarmCall {
    Schedule(AlarmTag, Duration),
    Cancel(AlarmTag),
}

/// Records schedule/cancel calls; tests fire alarms by posting
/// `Event::Alarm` straight into the manager.
#[derive(Clone)]
pub struct RecordingAlarms(pub Arc<Mutex<Vec<AlarmCall>>>);

impl RecordingAlarms {
    pub fn new() -> Self {
        RecordingAlarms(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn calls(&self) -> Vec<AlarmCall> {
        self.0.lock().unwrap().clone()
    }

    pub fn last_schedule(&self, tag: AlarmTag) -> Option<Duration> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|c| match c {
                AlarmCall::Schedule(t, d) if t.name() == tag.name() => Some(*d),
                _ => None,
            })
    }

    pub fn cancelled(&self, tag: AlarmTag) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, AlarmCall::Cancel(t) if t.name() == tag.name()))
    }
}

impl AlarmService for RecordingAlarms {
    fn schedule(&mut self, tag: AlarmTag, delay: Duration) {
        self.0.lock().unwrap().push(AlarmCall::Schedule(tag, delay));
    }

    fn cancel(&mut self, tag: AlarmTag) {
        self.0.lock().unwrap().push(AlarmCall::Cancel(tag));
    }

    fn is_pending(&self, tag: AlarmTag) -> bool {
        let mut pending = false;
        for call in self.0.lock().unwrap().iter() {
            match call {
                AlarmCall::Schedule(t, _) if t.name() == tag.name() => pending = true,
                AlarmCall::Cancel(t) if t.name() == tag.name() => pending = false,
                _ => {}
            }
        }
        pending
    }
}

// ───── score cache ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScoreTable {
    pub scores: Vec<((String, String), i32)>,
    pub metered: Vec<String>,
    pub requests: Vec<NetworkScoreKey>,
}

#[derive(Clone)]
pub struct FakeScoreCache(pub Arc<Mutex<ScoreTable>>);

impl FakeScoreCache {
    pub fn new() -> Self {
        FakeScoreCache(Arc::new(Mutex::new(ScoreTable::default())))
    }

    pub fn set_score(&self, ssid: &str, bssid: &str, score: i32) {
        self.0
            .lock()
            .unwrap()
            .scores
            .push(((ssid.to_owned(), bssid.to_owned()), score));
    }

    pub fn set_metered(&self, bssid: &str) {
        self.0.lock().unwrap().metered.push(bssid.to_owned());
    }

    pub fn requested(&self) -> Vec<NetworkScoreKey> {
        self.0.lock().unwrap().requests.clone()
    }
}

impl ScoreCache for FakeScoreCache {
    fn is_scored_network(&self, result: &ScanResult) -> bool {
        self.0
            .lock()
            .unwrap()
            .scores
            .iter()
            .any(|((s, b), _)| *s == result.ssid && *b == result.bssid)
    }

    fn get_network_score(&self, result: &ScanResult, _active: bool) -> Option<i32> {
        self.0
            .lock()
            .unwrap()
            .scores
            .iter()
            .find(|((s, b), _)| *s == result.ssid && *b == result.bssid)
            .map(|(_, score)| *score)
    }

    fn get_metered_hint(&self, result: &ScanResult) -> bool {
        self.0
            .lock()
            .unwrap()
            .metered
            .iter()
            .any(|b| *b == result.bssid)
    }

    fn request_scores(&self, keys: &[NetworkScoreKey]) {
        self.0.lock().unwrap().requests.extend_from_slice(keys);
    }
}

// ───── fixtures ─────────────────────────────────────────────────────────────

pub fn scan_result(ssid: &str, bssid: &str, rssi: i32, frequency: u32, caps: &str) -> ScanResult {
    ScanResult {
        ssid: ssid.to_owned(),
        bssid: bssid.to_owned(),
        rssi,
        frequency,
        capabilities: caps.to_owned(),
        timestamp_micros: 0,
    }
}

pub fn psk_network(ssid: &str) -> NetworkConfig {
    NetworkConfig::new(NetworkId::INVALID, ssid, Security::Psk)
}

pub fn open_network(ssid: &str) -> NetworkConfig {
    NetworkConfig::new(NetworkId::INVALID, ssid, Security::Open)
}
