//! Network selection end to end: evaluator priority order, composite
//! scoring, user connect choices and the externally scored path, all driven
//! through `NetworkSelector::select_network` against the in-memory store.

mod common;

use std::sync::{Arc, Mutex};

use autojoin::config::{ScoringConfig, SelectionConfig};
use autojoin::model::{DisableReason, NetworkConfig, NetworkId, ScanResult};
use autojoin::platform::{ConfigStore, LinkInfo, MemoryConfigStore};
use autojoin::selector::{
    ConnectableNetwork, ExternalScoreEvaluator, NetworkEvaluator, NetworkSelector,
    SavedNetworkEvaluator, EVALUATOR_MIN_PRIORITY,
};

use common::{open_network, psk_network, scan_result, FakeScoreCache, TestClock};

fn saved_only(clock: Arc<TestClock>) -> NetworkSelector {
    let mut selector = NetworkSelector::new(
        ScoringConfig::default(),
        SelectionConfig::default(),
        clock.clone(),
    );
    let saved = SavedNetworkEvaluator::new(ScoringConfig::default(), clock);
    assert!(selector.register_evaluator(Box::new(saved), 1));
    selector
}

fn with_external(clock: Arc<TestClock>, cache: &FakeScoreCache) -> NetworkSelector {
    let mut selector = saved_only(clock);
    let external = ExternalScoreEvaluator::new(Arc::new(cache.clone()));
    assert!(selector.register_evaluator(Box::new(external), 2));
    selector
}

fn disconnected() -> LinkInfo {
    LinkInfo::default()
}

#[test]
fn stronger_bssid_of_the_same_network_wins() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    store.insert(psk_network("HomeNetwork"));

    let results = vec![
        scan_result("HomeNetwork", "6c:f3:7f:ae:8c:f4", -70, 5180, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("HomeNetwork", "6c:f3:7f:ae:8c:f3", -60, 5180, "[WPA2-PSK-CCMP][ESS]"),
    ];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .expect("a candidate");
    assert_eq!(
        chosen.status.candidate.unwrap().bssid,
        "6c:f3:7f:ae:8c:f3"
    );
}

#[test]
fn secure_network_beats_a_stronger_open_one() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    store.insert(open_network("Guest"));
    store.insert(psk_network("Home"));

    // Guest: (-65 + 85) * 4 = 80. Home: (-78 + 85) * 4 + 40 + 80 = 148.
    let results = vec![
        scan_result("Guest", "00:25:9c:4b:12:01", -65, 2412, "[ESS]"),
        scan_result("Home", "6c:f3:7f:ae:8c:f3", -78, 5180, "[WPA2-PSK-CCMP][ESS]"),
    ];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .expect("a candidate");
    assert_eq!(chosen.ssid, "Home");
}

#[test]
fn user_connect_choice_overrides_the_score_order() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let strong = store.insert(psk_network("Strong"));
    let weak = store.insert(psk_network("Weak"));
    let weak_key = store.get_configured_network(weak).unwrap().config_key();
    store.set_network_connect_choice(strong, &weak_key, 0);

    let results = vec![
        scan_result("Strong", "00:00:00:00:00:01", -58, 2412, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("Weak", "00:00:00:00:00:02", -70, 2412, "[WPA2-PSK-CCMP][ESS]"),
    ];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .expect("a candidate");
    assert_eq!(chosen.network_id, weak);
}

#[test]
fn connect_choice_cycle_stops_at_the_last_good_hop() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let a = store.insert(psk_network("Alpha"));
    let b = store.insert(psk_network("Beta"));
    let a_key = store.get_configured_network(a).unwrap().config_key();
    let b_key = store.get_configured_network(b).unwrap().config_key();
    store.set_network_connect_choice(a, &b_key, 0);
    store.set_network_connect_choice(b, &a_key, 0);

    let results = vec![
        scan_result("Alpha", "00:00:00:00:00:01", -58, 2412, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("Beta", "00:00:00:00:00:02", -70, 2412, "[WPA2-PSK-CCMP][ESS]"),
    ];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .expect("a candidate");
    assert_eq!(chosen.network_id, b);
}

#[test]
fn selection_cools_down_while_connected() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock.clone());
    let mut store = MemoryConfigStore::new();
    let home = store.insert(psk_network("Home"));

    // Connected on 2.4GHz with a weak signal: never sufficient.
    let link = LinkInfo {
        network_id: Some(home),
        bssid: Some("6c:f3:7f:ae:8c:f4".into()),
        rssi: -75,
        frequency: 2412,
        ..Default::default()
    };
    let results = vec![
        scan_result("Home", "6c:f3:7f:ae:8c:f4", -75, 2412, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("Home", "6c:f3:7f:ae:8c:f3", -58, 5180, "[WPA2-PSK-CCMP][ESS]"),
    ];

    assert!(selector
        .select_network(&mut store, &results, &link, true, false, false)
        .is_some());
    // Back-to-back passes while associated are suppressed.
    assert!(selector
        .select_network(&mut store, &results, &link, true, false, false)
        .is_none());

    clock.advance(10_000);
    assert!(selector
        .select_network(&mut store, &results, &link, true, false, false)
        .is_some());
}

#[test]
fn sufficient_current_network_needs_no_replacement() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let home = store.insert(psk_network("Home"));

    let link = LinkInfo {
        network_id: Some(home),
        bssid: Some("6c:f3:7f:ae:8c:f3".into()),
        rssi: -65,
        frequency: 5180,
        ..Default::default()
    };
    let results = vec![
        scan_result("Home", "6c:f3:7f:ae:8c:f3", -65, 5180, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("Other", "00:00:00:00:00:09", -50, 5180, "[WPA2-PSK-CCMP][ESS]"),
    ];
    assert!(selector
        .select_network(&mut store, &results, &link, true, false, false)
        .is_none());
}

#[test]
fn disabled_network_is_skipped_but_marked_seen() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let home = store.insert(psk_network("Home"));
    store.update_network_selection_status(home, DisableReason::ByWifiManager);

    let results = vec![scan_result(
        "Home",
        "6c:f3:7f:ae:8c:f3",
        -58,
        5180,
        "[WPA2-PSK-CCMP][ESS]",
    )];
    assert!(selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .is_none());
    assert!(
        store
            .get_configured_network(home)
            .unwrap()
            .status
            .seen_in_last_selection
    );
}

#[test]
fn pinned_bssid_rejects_other_access_points() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let mut home = psk_network("Home");
    home.bssid = Some("6c:f3:7f:ae:8c:f3".into());
    store.insert(home);

    let results = vec![scan_result(
        "Home",
        "6c:f3:7f:ae:8c:f4",
        -58,
        5180,
        "[WPA2-PSK-CCMP][ESS]",
    )];
    assert!(selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .is_none());
}

#[test]
fn last_user_selection_award_decays_to_nothing() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock.clone());
    let mut store = MemoryConfigStore::new();
    let _beta = store.insert(psk_network("Beta"));
    let alpha = store.insert(psk_network("Alpha"));
    store.set_last_selected_network(alpha, 0);

    // Identical scores otherwise; Beta is tracked first and keeps a tie.
    let results = vec![
        scan_result("Beta", "00:00:00:00:00:02", -65, 2412, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("Alpha", "00:00:00:00:00:01", -65, 2412, "[WPA2-PSK-CCMP][ESS]"),
    ];

    clock.advance(60_000);
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .expect("a candidate");
    assert_eq!(chosen.ssid, "Alpha");

    // 481 minutes later the award has fully decayed.
    clock.advance(480 * 60_000);
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .expect("a candidate");
    assert_eq!(chosen.ssid, "Beta");
}

#[test]
fn weak_unvalidated_network_is_still_nominated_when_alone() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let mut cafe = open_network("Cafe");
    cafe.no_internet_reports = 1;
    cafe.validated_internet = false;
    let cafe_id = store.insert(cafe);

    // (-85 + 85) * 4 - 260 = -260; deeply negative, but the only option.
    let results = vec![scan_result("Cafe", "00:25:9c:4b:12:01", -85, 2412, "[ESS]")];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .expect("a candidate");
    assert_eq!(chosen.network_id, cafe_id);
}

#[test]
fn saved_network_wins_an_exact_external_score_tie() {
    let clock = TestClock::new();
    let cache = FakeScoreCache::new();
    cache.set_score("Cafe", "00:25:9c:4b:12:01", 10);
    cache.set_score("Corp", "00:25:9c:4b:12:02", 10);
    let mut selector = with_external(clock, &cache);

    let mut store = MemoryConfigStore::new();
    let mut corp = psk_network("Corp");
    corp.use_external_scores = true;
    let corp_id = store.insert(corp);

    let results = vec![
        scan_result("Cafe", "00:25:9c:4b:12:01", -60, 2412, "[ESS]"),
        scan_result("Corp", "00:25:9c:4b:12:02", -60, 2412, "[WPA2-PSK-CCMP][ESS]"),
    ];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, true)
        .expect("a candidate");
    assert_eq!(chosen.network_id, corp_id);
    assert!(!chosen.ephemeral);
}

#[test]
fn untrusted_winner_becomes_a_registered_ephemeral_network() {
    let clock = TestClock::new();
    let cache = FakeScoreCache::new();
    cache.set_score("Cafe", "00:25:9c:4b:12:01", 7);
    cache.set_metered("00:25:9c:4b:12:01");
    let mut selector = with_external(clock, &cache);
    let mut store = MemoryConfigStore::new();

    let results = vec![scan_result("Cafe", "00:25:9c:4b:12:01", -60, 2412, "[ESS]")];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, true)
        .expect("a candidate");

    assert!(chosen.network_id.is_valid());
    assert!(chosen.ephemeral);
    assert!(chosen.use_external_scores);
    assert!(chosen.metered_hint);
    assert_eq!(
        chosen.status.candidate.unwrap().bssid,
        "00:25:9c:4b:12:01"
    );
    assert_eq!(store.get_saved_networks().len(), 1);
}

#[test]
fn deleted_ephemeral_networks_are_never_recreated() {
    let clock = TestClock::new();
    let cache = FakeScoreCache::new();
    cache.set_score("Cafe", "00:25:9c:4b:12:01", 7);
    let mut selector = with_external(clock, &cache);
    let mut store = MemoryConfigStore::new();
    store.note_ephemeral_deleted("Cafe");

    let results = vec![scan_result("Cafe", "00:25:9c:4b:12:01", -60, 2412, "[ESS]")];
    assert!(selector
        .select_network(&mut store, &results, &disconnected(), false, true, true)
        .is_none());
    assert!(store.get_saved_networks().is_empty());
}

#[test]
fn untrusted_networks_are_ignored_unless_allowed() {
    let clock = TestClock::new();
    let cache = FakeScoreCache::new();
    cache.set_score("Cafe", "00:25:9c:4b:12:01", 7);
    let mut selector = with_external(clock, &cache);
    let mut store = MemoryConfigStore::new();

    let results = vec![scan_result("Cafe", "00:25:9c:4b:12:01", -60, 2412, "[ESS]")];
    assert!(selector
        .select_network(&mut store, &results, &disconnected(), false, true, false)
        .is_none());
    assert!(store.get_saved_networks().is_empty());
}

#[test]
fn higher_priority_evaluator_short_circuits_the_pass() {
    let clock = TestClock::new();
    let cache = FakeScoreCache::new();
    cache.set_score("Cafe", "00:25:9c:4b:12:01", 100);
    let mut selector = with_external(clock, &cache);
    let mut store = MemoryConfigStore::new();
    store.insert(psk_network("Home"));

    let results = vec![
        scan_result("Home", "6c:f3:7f:ae:8c:f3", -70, 2412, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("Cafe", "00:25:9c:4b:12:01", -50, 2412, "[ESS]"),
    ];
    let chosen = selector
        .select_network(&mut store, &results, &disconnected(), false, true, true)
        .expect("a candidate");
    assert_eq!(chosen.ssid, "Home");
    // The external evaluator never ran, so no ephemeral config was added.
    assert_eq!(store.get_saved_networks().len(), 1);
}

#[test]
fn failed_ephemeral_registration_drops_the_candidate() {
    let cache = FakeScoreCache::new();
    cache.set_score("", "00:25:9c:4b:12:01", 5);
    let mut evaluator = ExternalScoreEvaluator::new(Arc::new(cache));
    let mut store = MemoryConfigStore::new();

    // An unnamed result is rejected by the store on registration.
    let results = vec![scan_result("", "00:25:9c:4b:12:01", -60, 2412, "[ESS]")];
    let mut connectable: Vec<ConnectableNetwork> = Vec::new();
    let chosen =
        evaluator.evaluate_networks(&mut store, &results, None, None, false, true, &mut connectable);
    assert!(chosen.is_none());
    assert!(store.get_saved_networks().is_empty());
}

#[test]
fn evaluator_slots_reject_conflicts_and_bad_priorities() {
    let clock = TestClock::new();
    let mut selector = NetworkSelector::new(
        ScoringConfig::default(),
        SelectionConfig::default(),
        clock.clone(),
    );
    let mk = || {
        Box::new(SavedNetworkEvaluator::new(
            ScoringConfig::default(),
            clock.clone(),
        ))
    };
    assert!(selector.register_evaluator(mk(), 3));
    assert!(!selector.register_evaluator(mk(), 3));
    assert!(!selector.register_evaluator(mk(), EVALUATOR_MIN_PRIORITY));
}

struct SpyEvaluator {
    updates: Arc<Mutex<u32>>,
}

impl NetworkEvaluator for SpyEvaluator {
    fn name(&self) -> &'static str {
        "SpyEvaluator"
    }

    fn update(&mut self, _store: &mut dyn ConfigStore, _scan_results: &[ScanResult]) {
        *self.updates.lock().unwrap() += 1;
    }

    fn evaluate_networks(
        &mut self,
        _store: &mut dyn ConfigStore,
        _scan_results: &[ScanResult],
        _current_network: Option<&NetworkConfig>,
        _current_bssid: Option<&str>,
        _connected: bool,
        _untrusted_allowed: bool,
        _connectable: &mut Vec<ConnectableNetwork>,
    ) -> Option<NetworkConfig> {
        None
    }
}

#[test]
fn evaluators_only_update_when_a_pass_actually_runs() {
    let clock = TestClock::new();
    let updates = Arc::new(Mutex::new(0));
    let mut selector = NetworkSelector::new(
        ScoringConfig::default(),
        SelectionConfig::default(),
        clock,
    );
    selector.register_evaluator(
        Box::new(SpyEvaluator {
            updates: updates.clone(),
        }),
        0,
    );
    let mut store = MemoryConfigStore::new();
    let results = vec![scan_result("a", "00:00:00:00:00:01", -50, 2412, "[ESS]")];

    // Empty batch: short-circuits before the evaluators.
    selector.select_network(&mut store, &[], &disconnected(), false, true, false);
    assert_eq!(*updates.lock().unwrap(), 0);

    // Mid-transition link: selection is not needed.
    selector.select_network(&mut store, &results, &disconnected(), false, false, false);
    assert_eq!(*updates.lock().unwrap(), 0);

    selector.select_network(&mut store, &results, &disconnected(), false, true, false);
    assert_eq!(*updates.lock().unwrap(), 1);
}

#[test]
fn user_choice_stamps_preferences_and_reenables_the_network() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let alpha = store.insert(psk_network("Alpha"));
    let beta = store.insert(psk_network("Beta"));

    // One pass so both networks are seen.
    let results = vec![
        scan_result("Alpha", "00:00:00:00:00:01", -58, 2412, "[WPA2-PSK-CCMP][ESS]"),
        scan_result("Beta", "00:00:00:00:00:02", -70, 2412, "[WPA2-PSK-CCMP][ESS]"),
    ];
    selector.select_network(&mut store, &results, &disconnected(), false, true, false);

    store.update_network_selection_status(beta, DisableReason::AssociationRejection);
    assert!(selector.set_user_connect_choice(&mut store, beta));

    let alpha_cfg = store.get_configured_network(alpha).unwrap();
    let beta_cfg = store.get_configured_network(beta).unwrap();
    let beta_key = beta_cfg.config_key();
    assert_eq!(alpha_cfg.status.connect_choice, Some(beta_key));
    assert_eq!(beta_cfg.status.connect_choice, None);
    assert!(beta_cfg.status.is_enabled());
    assert_eq!(store.get_last_selected_network(), Some(beta));
}

#[test]
fn user_choice_overrides_a_permanent_disable() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    let beta = store.insert(psk_network("Beta"));

    let results = vec![scan_result(
        "Beta",
        "00:00:00:00:00:02",
        -70,
        2412,
        "[WPA2-PSK-CCMP][ESS]",
    )];
    selector.select_network(&mut store, &results, &disconnected(), false, true, false);

    store.update_network_selection_status(beta, DisableReason::ByWifiManager);
    assert!(selector.set_user_connect_choice(&mut store, beta));
    assert!(store.get_configured_network(beta).unwrap().status.is_enabled());
}

#[test]
fn unknown_user_choice_changes_nothing() {
    let clock = TestClock::new();
    let mut selector = saved_only(clock);
    let mut store = MemoryConfigStore::new();
    assert!(!selector.set_user_connect_choice(&mut store, NetworkId(42)));
}
