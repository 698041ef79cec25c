//! The control loop that keeps exactly one scanning mode active and turns
//! scan results into connect or roam requests.
//!
//! All state lives behind one event stream: platform callbacks, timers and
//! user actions arrive as [`Event`]s and are handled on a single task, so no
//! handler ever races another.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::model::{Config, ScanConfig, ScoringConfig};
use crate::events::{AlarmTag, Event, WifiState};
use crate::model::{NetworkConfig, ScanBatch, ScanResult};
use crate::platform::{
    AlarmService, Clock, ConfigStore, LinkLayer, PnoSettings, ScanBand, ScanSettings, ScanSource,
    WifiScanner,
};
use crate::selector::{ExternalScoreEvaluator, NetworkSelector, SavedNetworkEvaluator};

use super::attempts::ConnectionAttemptLog;
use super::tracker::AvailableNetworksTracker;

/// Evaluator priority slots (0 = highest). Slot 0 is reserved.
const SAVED_NETWORK_EVALUATOR_PRIORITY: usize = 1;
const EXTERNAL_SCORE_EVALUATOR_PRIORITY: usize = 2;

/// Platform collaborators handed to the manager at construction.
pub struct Platform {
    pub store: Box<dyn ConfigStore>,
    pub scanner: Box<dyn WifiScanner>,
    pub link: Box<dyn LinkLayer>,
    pub alarms: Box<dyn AlarmService>,
    pub clock: Arc<dyn Clock>,
}

pub struct ConnectivityManager {
    scan_config: ScanConfig,
    scoring: ScoringConfig,

    store: Box<dyn ConfigStore>,
    scanner: Box<dyn WifiScanner>,
    link: Box<dyn LinkLayer>,
    alarms: Box<dyn AlarmService>,
    clock: Arc<dyn Clock>,
    selector: NetworkSelector,
    tracker: AvailableNetworksTracker,
    attempts: ConnectionAttemptLog,

    enable_auto_join_when_associated: bool,
    wifi_enabled: bool,
    auto_join_enabled: bool,
    screen_on: bool,
    state: WifiState,
    untrusted_allowed: bool,

    scan_restart_count: u32,
    single_scan_restart_count: u32,
    total_attempts_rate_limited: u64,
    last_connection_attempt_bssid: Option<String>,
    periodic_scan_interval: Duration,
    last_periodic_scan_millis: Option<i64>,
    pno_scan_started: bool,
    wait_for_full_band: bool,
    low_rssi_retry_delay: Duration,
    single_scan_buffer: Vec<ScanResult>,
}

impl ConnectivityManager {
    pub fn new(config: &Config, mut selector: NetworkSelector, mut platform: Platform) -> Self {
        let saved =
            SavedNetworkEvaluator::new(config.scoring.clone(), Arc::clone(&platform.clock));
        if !selector.register_evaluator(Box::new(saved), SAVED_NETWORK_EVALUATOR_PRIORITY) {
            warn!("Failed to register the saved network evaluator");
        }

        info!(
            "PNO settings: min5GHzRssi {} min24GHzRssi {} initialScoreMax {}",
            config.scoring.min_rssi_5ghz,
            config.scoring.min_rssi_24ghz,
            config.scoring.initial_score_max()
        );

        // Hear about every single scan on the system, not only our own.
        platform.scanner.register_all_single_scans_listener();

        ConnectivityManager {
            scan_config: config.scan.clone(),
            scoring: config.scoring.clone(),
            store: platform.store,
            scanner: platform.scanner,
            link: platform.link,
            alarms: platform.alarms,
            clock: platform.clock,
            selector,
            tracker: AvailableNetworksTracker::new(),
            attempts: ConnectionAttemptLog::new(),
            enable_auto_join_when_associated: config.selection.enable_auto_join_when_associated,
            wifi_enabled: false,
            auto_join_enabled: true,
            screen_on: false,
            state: WifiState::Unknown,
            untrusted_allowed: config.selection.untrusted_networks_allowed,
            scan_restart_count: 0,
            single_scan_restart_count: 0,
            total_attempts_rate_limited: 0,
            last_connection_attempt_bssid: None,
            periodic_scan_interval: config.scan.periodic_interval,
            last_periodic_scan_millis: None,
            pno_scan_started: false,
            wait_for_full_band: false,
            low_rssi_retry_delay: config.scan.low_rssi_retry_start,
            single_scan_buffer: Vec::new(),
        }
    }

    /// Register the evaluator for externally scored networks. Separate from
    /// construction because a score cache is not always available.
    pub fn register_external_score_evaluator(&mut self, evaluator: ExternalScoreEvaluator) {
        if !self
            .selector
            .register_evaluator(Box::new(evaluator), EXTERNAL_SCORE_EVALUATOR_PRIORITY)
        {
            warn!("Failed to register the external score evaluator");
        }
    }

    /// Drive the manager from the event stream until `Event::Shutdown` or the
    /// channel closes.
    pub async fn run(mut self, mut events: UnboundedReceiver<Event>) {
        info!("Connectivity manager loop started");
        while let Some(event) = events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        self.stop_connectivity_scan();
        info!("Connectivity manager loop stopped");
    }

    /// Dispatch one event. Returns false when the loop should exit.
    pub fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::ScanSuccess { source } => {
                debug!("Scan started: {source:?}");
            }
            Event::ScanFailure { source } => self.handle_scan_failure(source),
            Event::ScanResult { source, result } => self.handle_full_result(source, result),
            Event::ScanBatch { source, batch } => self.handle_scan_batch(source, batch),
            Event::PnoNetworkFound { results } => self.handle_pno_network_found(results),
            Event::Alarm(tag) => self.handle_alarm(tag),
            Event::ScreenStateChanged { on } => self.handle_screen_state_changed(on),
            Event::ConnectionStateChanged(state) => self.handle_connection_state_changed(state),
            Event::UntrustedConnectionAllowed(allowed) => {
                self.set_untrusted_connection_allowed(allowed)
            }
            Event::UserConnectChoice { network_id } => {
                self.selector.set_user_connect_choice(&mut *self.store, network_id);
                self.attempts.clear();
            }
            Event::ForceConnectivityScan => self.force_connectivity_scan(),
            Event::TrackBssid { bssid, available } => {
                self.track_bssid(&bssid, available);
            }
            Event::WifiEnabled(enabled) => self.set_wifi_enabled(enabled),
            Event::Shutdown => return false,
        }
        true
    }

    fn enabled(&self) -> bool {
        self.wifi_enabled && self.auto_join_enabled
    }

    /// Feed a completed batch through the selector and connect if a candidate
    /// comes back. Returns whether a connection was attempted.
    fn handle_scan_results(&mut self, scan_results: &[ScanResult], origin: &str) -> bool {
        if self.link.is_link_debouncing() || self.link.is_supplicant_transient() {
            debug!("{origin}: no selection while the link is in a transient state");
            return false;
        }

        debug!("{origin}: starting network selection");
        let link_info = self.link.link_info();
        let candidate = self.selector.select_network(
            &mut *self.store,
            scan_results,
            &link_info,
            self.link.is_connected(),
            self.link.is_disconnected(),
            self.untrusted_allowed,
        );
        self.tracker
            .update_available_networks(self.selector.connectable_networks());
        metrics::counter!("autojoin_scan_results_handled").increment(scan_results.len() as u64);

        match candidate {
            Some(candidate) => {
                info!("{origin}: candidate {}", candidate.network_string());
                self.connect_to_network(&candidate);
                true
            }
            None => false,
        }
    }

    /// Issue a roam or reconnect for the selected candidate.
    fn connect_to_network(&mut self, candidate: &NetworkConfig) {
        let scan_result = match &candidate.status.candidate {
            Some(result) => result.clone(),
            None => {
                // Evaluation inconsistency: a candidate must carry the scan
                // result that nominated it.
                warn!(
                    "connect_to_network: bad candidate {} without a scan result",
                    candidate.network_string()
                );
                return;
            }
        };

        let target_bssid = scan_result.bssid.clone();
        let link_info = self.link.link_info();

        // The firmware may have roamed on its own, so check both the last
        // attempt and the BSSID the link currently reports.
        let already_targeted = self.last_connection_attempt_bssid.as_deref()
            == Some(target_bssid.as_str())
            || link_info.bssid.as_deref() == Some(target_bssid.as_str());
        if already_targeted && link_info.supplicant_connecting {
            debug!(
                "connect_to_network: already connected or connecting to {}:{target_bssid}",
                candidate.ssid
            );
            return;
        }

        let now = self.clock.elapsed_millis();
        if !self.screen_on && self.attempts.should_skip(now) {
            info!("connect_to_network: too many connection attempts, skipping");
            self.total_attempts_rate_limited += 1;
            metrics::counter!("autojoin_connect_attempts_rate_limited").increment(1);
            return;
        }
        self.attempts.note(now);
        self.last_connection_attempt_bssid = Some(target_bssid.clone());

        let current = self.link.get_current_configuration();
        let is_roam = current
            .as_ref()
            .map(|c| c.network_id == candidate.network_id || c.is_linked(candidate))
            .unwrap_or(false);
        if is_roam {
            info!(
                "connect_to_network: roaming to {}:{target_bssid}",
                candidate.ssid
            );
            self.link
                .start_roam_to_network(candidate.network_id, &target_bssid);
        } else {
            info!(
                "connect_to_network: reconnecting to {}:{target_bssid}",
                candidate.ssid
            );
            self.link
                .start_connect_to_network(candidate.network_id, &target_bssid);
        }
        metrics::counter!("autojoin_connect_attempts").increment(1);
    }

    /// Channels to cover in a partial scan, from the store's per-network
    /// channel history. `None` means fall back to a full-band scan.
    fn partial_scan_channels(&self) -> Option<Vec<u32>> {
        let config = self.link.get_current_configuration()?;
        let frequency = self.link.link_info().frequency;
        let channels = self.store.fetch_channel_set_for_network(
            config.network_id,
            self.scan_config.channel_list_age.as_millis() as i64,
            frequency,
        )?;
        if channels.is_empty() {
            debug!(
                "No scan channels for {}, performing full band scan",
                config.config_key()
            );
            return None;
        }
        Some(channels.into_iter().collect())
    }

    fn start_single_scan(&mut self, mut full_band: bool) {
        if !self.enabled() {
            return;
        }

        self.low_rssi_retry_delay = self.scan_config.low_rssi_retry_start;

        let mut channels = Vec::new();
        if !full_band {
            match self.partial_scan_channels() {
                Some(list) => channels = list,
                None => full_band = true,
            }
        }
        let settings = ScanSettings {
            band: if full_band {
                ScanBand::BothWithDfs
            } else {
                ScanBand::ChannelList
            },
            channels,
            report_each_result: true,
            hidden_networks: self.store.retrieve_hidden_network_list(),
        };
        self.scanner
            .start_scan(settings, ScanSource::Single { full_band });
    }

    /// Run one periodic single scan and arm the next, doubling the interval
    /// up to its ceiling.
    fn start_periodic_single_scan(&mut self) {
        let now = self.clock.elapsed_millis();

        if let Some(last) = self.last_periodic_scan_millis {
            let since_last = now - last;
            let base = self.scan_config.periodic_interval.as_millis() as i64;
            if since_last < base {
                debug!(
                    "Last periodic scan started {since_last}ms ago, deferring this request"
                );
                self.alarms.schedule(
                    AlarmTag::PeriodicScan,
                    Duration::from_millis((base - since_last) as u64),
                );
                return;
            }
        }

        let mut full_band = true;
        if self.state == WifiState::Connected {
            let link_info = self.link.link_info();
            if link_info.tx_success_rate > self.scan_config.max_tx_packet_rate
                || link_info.rx_success_rate > self.scan_config.max_rx_packet_rate
            {
                debug!(
                    "Heavy traffic (tx {:.1}, rx {:.1} pkt/s), going partial",
                    link_info.tx_success_rate, link_info.rx_success_rate
                );
                full_band = false;
            }
        }

        self.last_periodic_scan_millis = Some(now);
        self.start_single_scan(full_band);
        self.alarms
            .schedule(AlarmTag::PeriodicScan, self.periodic_scan_interval);

        self.periodic_scan_interval = (self.periodic_scan_interval * 2)
            .min(self.scan_config.max_periodic_interval);
    }

    fn start_periodic_scan(&mut self, scan_immediately: bool) {
        self.low_rssi_retry_delay = self.scan_config.low_rssi_retry_start;

        // No connectivity scan while associated if roaming is disabled.
        if self.state == WifiState::Connected && !self.enable_auto_join_when_associated {
            return;
        }

        if scan_immediately {
            self.last_periodic_scan_millis = None;
        }
        self.periodic_scan_interval = self.scan_config.periodic_interval;
        self.start_periodic_single_scan();
    }

    fn start_disconnected_pno_scan(&mut self) {
        let networks = self.store.retrieve_pno_network_list();
        if networks.is_empty() {
            info!("No saved network for starting disconnected PNO");
            return;
        }

        let pno = PnoSettings {
            interval_millis: self.scan_config.pno_interval.as_millis() as i64,
            min_rssi_24ghz: self.scoring.min_rssi_24ghz,
            min_rssi_5ghz: self.scoring.min_rssi_5ghz,
            initial_score_max: self.scoring.initial_score_max(),
            networks,
        };
        let scan = ScanSettings {
            band: ScanBand::BothWithDfs,
            channels: Vec::new(),
            report_each_result: false,
            hidden_networks: Vec::new(),
        };
        self.scanner.start_disconnected_pno_scan(scan, pno);
        self.pno_scan_started = true;
    }

    fn stop_pno_scan(&mut self) {
        if self.pno_scan_started {
            self.scanner.stop_pno_scan();
        }
        self.pno_scan_started = false;
    }

    fn schedule_watchdog_timer(&mut self) {
        debug!("Arming the watchdog timer");
        self.alarms
            .schedule(AlarmTag::Watchdog, self.scan_config.watchdog_interval);
    }

    /// Pick the scanning mode for the current screen and link state. Always
    /// stops the previous mode first so modes never overlap.
    fn start_connectivity_scan(&mut self, scan_immediately: bool) {
        debug!(
            "start_connectivity_scan: screen_on={} state={:?} immediately={scan_immediately} \
             enabled={}",
            self.screen_on,
            self.state,
            self.enabled()
        );

        if !self.enabled() {
            return;
        }

        self.stop_connectivity_scan();

        // No scanning while the link transitions between connected and
        // disconnected.
        if self.state != WifiState::Connected && self.state != WifiState::Disconnected {
            return;
        }

        if self.screen_on {
            self.start_periodic_scan(scan_immediately);
        } else if self.state == WifiState::Disconnected {
            self.start_disconnected_pno_scan();
        }
    }

    fn stop_connectivity_scan(&mut self) {
        self.alarms.cancel(AlarmTag::PeriodicScan);
        self.stop_pno_scan();
        self.scan_restart_count = 0;
    }

    fn handle_alarm(&mut self, tag: AlarmTag) {
        match tag {
            AlarmTag::Watchdog => {
                // The next timer is armed here while disconnected; otherwise
                // it will be re-armed on the next disconnect.
                if self.state == WifiState::Disconnected {
                    info!("Watchdog: starting a single scan");
                    self.schedule_watchdog_timer();
                    self.start_single_scan(true);
                }
            }
            AlarmTag::PeriodicScan => {
                if self.screen_on {
                    self.start_periodic_single_scan();
                }
            }
            AlarmTag::RestartSingleScan { full_band } => self.start_single_scan(full_band),
            AlarmTag::RestartConnectivityScan => self.start_connectivity_scan(true),
        }
    }

    fn handle_scan_failure(&mut self, source: ScanSource) {
        match source {
            ScanSource::AllSingle => {
                debug!("All-single-scans listener reported a failure");
            }
            ScanSource::Single { full_band } => {
                warn!("Single scan failed to start");
                metrics::counter!("autojoin_scan_start_failures").increment(1);
                self.single_scan_restart_count += 1;
                if self.single_scan_restart_count <= self.scan_config.max_scan_restarts {
                    self.alarms.schedule(
                        AlarmTag::RestartSingleScan { full_band },
                        self.scan_config.restart_delay,
                    );
                } else {
                    self.single_scan_restart_count = 0;
                    warn!(
                        "Failed to start a single scan {} times, giving up",
                        self.scan_config.max_scan_restarts
                    );
                }
            }
            ScanSource::Pno => {
                warn!("PNO scan failed to start");
                metrics::counter!("autojoin_scan_start_failures").increment(1);
                self.scan_restart_count += 1;
                if self.scan_restart_count <= self.scan_config.max_scan_restarts {
                    self.alarms.schedule(
                        AlarmTag::RestartConnectivityScan,
                        self.scan_config.restart_delay,
                    );
                } else {
                    self.scan_restart_count = 0;
                    warn!(
                        "Failed to start a PNO scan {} times, giving up",
                        self.scan_config.max_scan_restarts
                    );
                }
            }
        }
    }

    /// Streaming per-AP results are buffered until the terminal batch event.
    fn handle_full_result(&mut self, source: ScanSource, result: ScanResult) {
        if source != ScanSource::AllSingle {
            return;
        }
        if !self.enabled() {
            return;
        }
        self.single_scan_buffer.push(result);
    }

    fn handle_scan_batch(&mut self, source: ScanSource, batch: ScanBatch) {
        if source != ScanSource::AllSingle {
            // Results of our own single scans also reach the all-scans
            // listener, which is where they are processed.
            return;
        }
        if !self.enabled() {
            self.single_scan_buffer.clear();
            self.wait_for_full_band = false;
            return;
        }

        if self.wait_for_full_band {
            if !batch.all_channels_scanned {
                debug!("Waiting for full band scan results, dropping a partial batch");
                self.single_scan_buffer.clear();
                return;
            }
            self.wait_for_full_band = false;
        }

        let results = std::mem::take(&mut self.single_scan_buffer);
        let connected = self.handle_scan_results(&results, "single scan");

        // A single scan finding a network the PNO scan missed is worth
        // counting.
        if self.pno_scan_started {
            if connected {
                metrics::counter!("autojoin_pno_missed_candidate").increment(1);
            } else {
                metrics::counter!("autojoin_pno_confirmed_idle").increment(1);
            }
        }
    }

    fn handle_pno_network_found(&mut self, results: Vec<ScanResult>) {
        info!("PNO network found: {} results", results.len());
        let connected = self.handle_scan_results(&results, "pno scan");
        self.scan_restart_count = 0;

        if !connected {
            // The candidates were rejected, typically for low RSSI. Retry
            // with a doubling delay.
            if self.low_rssi_retry_delay > self.scan_config.low_rssi_retry_max {
                self.low_rssi_retry_delay = self.scan_config.low_rssi_retry_max;
            }
            self.alarms
                .schedule(AlarmTag::RestartConnectivityScan, self.low_rssi_retry_delay);
            self.low_rssi_retry_delay *= 2;
        } else {
            self.low_rssi_retry_delay = self.scan_config.low_rssi_retry_start;
        }
    }

    fn handle_screen_state_changed(&mut self, on: bool) {
        info!("Screen state changed: on={on}");
        self.screen_on = on;
        self.start_connectivity_scan(false);
    }

    fn handle_connection_state_changed(&mut self, state: WifiState) {
        info!("Connection state changed: {state:?}");
        self.state = state;

        if self.state == WifiState::Disconnected {
            self.last_connection_attempt_bssid = None;
            self.schedule_watchdog_timer();
        }
        self.start_connectivity_scan(false);
    }

    fn set_untrusted_connection_allowed(&mut self, allowed: bool) {
        info!("Untrusted connections allowed: {allowed}");
        if self.untrusted_allowed != allowed {
            self.untrusted_allowed = allowed;
            self.start_connectivity_scan(true);
        }
    }

    /// External request for a scan right now: always full band, and partial
    /// batches are discarded until the full-band one arrives.
    fn force_connectivity_scan(&mut self) {
        info!("Forced connectivity scan");
        self.wait_for_full_band = true;
        self.start_single_scan(true);
    }

    /// Record a BSSID rejection or clear one. Newly blacklisting a BSSID
    /// kicks off an immediate scan so the selector can offer an alternative.
    pub fn track_bssid(&mut self, bssid: &str, enable: bool) -> bool {
        info!("track_bssid: {} {bssid}", if enable { "enable" } else { "disable" });
        let changed = self
            .selector
            .enable_bssid_for_network_selection(bssid, enable);
        if changed && !enable {
            self.start_connectivity_scan(true);
        }
        changed
    }

    fn set_wifi_enabled(&mut self, enabled: bool) {
        info!("Wi-Fi {}", if enabled { "enabled" } else { "disabled" });
        self.wifi_enabled = enabled;

        if !enabled {
            self.stop_connectivity_scan();
            self.last_periodic_scan_millis = None;
            self.last_connection_attempt_bssid = None;
            self.wait_for_full_band = false;
        } else if self.auto_join_enabled {
            self.start_connectivity_scan(true);
        }
    }

    /// Runtime on/off switch for the whole control loop.
    pub fn set_auto_join_enabled(&mut self, enabled: bool) {
        info!("Auto-join {}", if enabled { "enabled" } else { "disabled" });
        self.auto_join_enabled = enabled;

        if !enabled {
            self.stop_connectivity_scan();
            self.last_periodic_scan_millis = None;
            self.last_connection_attempt_bssid = None;
            self.wait_for_full_band = false;
        } else if self.wifi_enabled {
            self.start_connectivity_scan(true);
        }
    }

    pub fn total_attempts_rate_limited(&self) -> u64 {
        self.total_attempts_rate_limited
    }

    pub fn available_networks_tracker(&self) -> &AvailableNetworksTracker {
        &self.tracker
    }

    /// Current PNO low-RSSI retry delay, for diagnostics.
    pub fn low_rssi_retry_delay(&self) -> Duration {
        self.low_rssi_retry_delay
    }

    /// Current (backed-off) periodic scan interval, for diagnostics.
    pub fn periodic_scan_interval(&self) -> Duration {
        self.periodic_scan_interval
    }
}
