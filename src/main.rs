// src/main.rs

//! Daemon entry point.
//!
//! 1. Parse configuration & set up structured logging
//! 2. Install the Prometheus metrics recorder
//! 3. Assemble the platform (simulated radio on plain hosts) and selector
//! 4. Run the connectivity control loop until Ctrl-C

// ───── std / 3rd-party imports ──────────────────────────────────────────────
use anyhow::Context;
use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{
    path::{Path, PathBuf},
    process,
};
use tokio::sync::mpsc;

// ───── local imports ────────────────────────────────────────────────────────
use autojoin::config::{load_config, Config};
use autojoin::connectivity::manager::{ConnectivityManager, Platform};
use autojoin::events::{Event, WifiState};
use autojoin::model::{NetworkConfig, NetworkId, Security};
use autojoin::platform::MemoryConfigStore;

mod sim;

/// Directory that contains the running executable.
fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .expect("Cannot determine exe path")
        .parent()
        .expect("Executable must live in some directory")
        .to_path_buf()
}

/// Load `autojoin.toml` next to the executable, falling back to defaults
/// when the file does not exist.
fn load_cfg(exe_dir: &Path) -> anyhow::Result<Config> {
    let path = exe_dir.join("autojoin.toml");
    if path.exists() {
        load_config(&path).with_context(|| format!("loading {}", path.display()))
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

/// Configure global logging as requested in `config.logging`.
fn setup_logging(exe_dir: &Path, config: &Config) -> Result<(), fern::InitError> {
    let level = match config.logging.level.to_uppercase().as_str() {
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let log_path = config
        .logging
        .enable_file
        .then(|| exe_dir.join(config.logging.file.as_deref().unwrap_or("autojoin.log")));

    let mut dispatch = Dispatch::new()
        .format(|out, msg, record| {
            out.finish(format_args!(
                "[{}][{:5}][{}][pid={}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                process::id(),
                msg
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = log_path {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}

/// Saved networks seeded into the in-memory store for the simulation.
fn seed_store() -> MemoryConfigStore {
    let mut store = MemoryConfigStore::new();
    store.insert(NetworkConfig::new(
        NetworkId::INVALID,
        "HomeNetwork",
        Security::Psk,
    ));
    store.insert(NetworkConfig::new(
        NetworkId::INVALID,
        "CoffeeShop",
        Security::Open,
    ));
    store
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let exe_dir = exe_dir();
    let config = load_cfg(&exe_dir)?;

    setup_logging(&exe_dir, &config).context("logging setup failed")?;
    log::info!("Daemon bootstrap initiated");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("metrics recorder setup failed")?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let (selector, platform) = sim::build_platform(&config, seed_store(), event_tx.clone());
    let mut manager = ConnectivityManager::new(&config, selector, platform);
    manager.register_external_score_evaluator(sim::external_score_evaluator());

    // Bring the simulated radio up: enabled, screen on, disconnected.
    event_tx.send(Event::WifiEnabled(true)).ok();
    event_tx.send(Event::ScreenStateChanged { on: true }).ok();
    event_tx
        .send(Event::ConnectionStateChanged(WifiState::Disconnected))
        .ok();

    let loop_handle = tokio::spawn(manager.run(event_rx));

    tokio::signal::ctrl_c().await.context("signal wait failed")?;
    log::warn!("Shutdown initiated");
    event_tx.send(Event::Shutdown).ok();
    loop_handle.await.ok();

    log::debug!("Final metrics:\n{}", metrics_handle.render());
    log::info!("Daemon stopped cleanly");
    Ok(())
}
