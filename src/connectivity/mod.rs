//! The connectivity control loop.

pub mod attempts;
pub mod manager;
pub mod tracker;

pub use attempts::ConnectionAttemptLog;
pub use manager::ConnectivityManager;
pub use tracker::AvailableNetworksTracker;
