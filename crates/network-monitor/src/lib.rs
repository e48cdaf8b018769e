#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`NetworkMonitorError`)
//! - [`config`]: Monitor configuration (`NetworkMonitorConfig`)
//! - [`record`]: Connection record model and line parsing (`ConnectionRecord`)
//! - [`allowlist`]: Destination allowlist (`Allowlist`)
//! - [`baseline`]: Per-peer sliding-window rate counter (`RateTracker`)
//! - [`portscan`]: Distinct-port scan heuristic (`PortScanTracker`)
//! - [`monitor`]: Single-pass analysis and `Collector` impl (`NetworkMonitor`)

pub mod allowlist;
pub mod baseline;
pub mod config;
pub mod error;
pub mod monitor;
pub mod portscan;
pub mod record;

// --- Public API Re-exports ---

pub use allowlist::Allowlist;
pub use baseline::RateTracker;
pub use config::NetworkMonitorConfig;
pub use error::NetworkMonitorError;
pub use monitor::NetworkMonitor;
pub use portscan::PortScanTracker;
pub use record::{ConnectionRecord, Protocol, parse_record};
