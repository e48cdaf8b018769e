#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`aggregate`]: Grouping, thresholds, dedup, ordering (`aggregate()`)
//! - [`report`]: Immutable run artifact (`Report`, `generate()`)

pub mod aggregate;
pub mod report;

// --- Public API Re-exports ---

pub use aggregate::aggregate;
pub use report::{Report, generate};
