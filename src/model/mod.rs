//! Core data model shared across the selector and the control loop.

pub mod network;
pub mod scan;

pub use network::{DisableReason, NetworkConfig, NetworkId, Security, SelectionStatus};
pub use scan::{ScanBatch, ScanResult};
