// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Public library entry point.  Re-export everything for both `main.rs` and
// integration tests.

pub mod config;
pub mod connectivity;
pub mod events;
pub mod model;
pub mod platform;
pub mod selector;
