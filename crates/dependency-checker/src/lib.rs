#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`DependencyCheckerError`)
//! - [`config`]: Checker configuration (`DependencyCheckerConfig`)
//! - [`declaration`]: Declaration document parsing (`DependencyDeclaration`)
//! - [`checker`]: Check logic and `Collector` impl (`DependencyChecker`)

pub mod checker;
pub mod config;
pub mod declaration;
pub mod error;

// --- Public API Re-exports ---

pub use checker::DependencyChecker;
pub use config::DependencyCheckerConfig;
pub use declaration::{DependencyDeclaration, PackageEntry, parse_declaration};
pub use error::DependencyCheckerError;
