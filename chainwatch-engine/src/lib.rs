#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`orchestrator`]: Run state machine, collector fan-out/fan-in
//!   (`ScanOrchestrator`, `ScanInputs`, `run()`)
//! - [`logging`]: Optional tracing subscriber setup for embedders
//!
//! # 사용 예시
//!
//! ```
//! use std::sync::Arc;
//!
//! use chainwatch_core::ChainwatchConfig;
//! use chainwatch_core::feed::StaticFeed;
//! use chainwatch_engine::{ScanInputs, run};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = ChainwatchConfig::default();
//! let feed = Arc::new(StaticFeed::empty());
//! let inputs = ScanInputs {
//!     connection_log: Some(
//!         "2024-01-15T12:00:00Z 10.0.0.5:51234 -> 192.168.1.9:443 tcp 1234".to_owned(),
//!     ),
//!     ..Default::default()
//! };
//!
//! let report = run(config, inputs, feed).await.unwrap();
//! assert!(!report.metadata.is_failed());
//! # }
//! ```

pub mod logging;
pub mod orchestrator;

// --- Public API Re-exports ---

pub use orchestrator::{RunState, ScanInputs, ScanOrchestrator, run};

// 소비자가 리포트 타입을 위해 aggregator를 직접 의존하지 않도록 재노출
pub use chainwatch_aggregator::Report;
