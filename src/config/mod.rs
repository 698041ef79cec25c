//! Public API for configuration

pub mod loader;
pub mod model;

// Re-export the main entrypoints:
pub use loader::load_config;
pub use model::{Config, ConfigError, ScanConfig, ScoringConfig, SelectionConfig};
