#![doc = include_str!("../README.md")]

pub mod collector;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod types;
pub mod version;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{AggregateError, ChainwatchError, ConfigError, LookupError, ParseError};

// 설정
pub use config::ChainwatchConfig;

// 도메인 타입
pub use types::{
    Alert, AlertThresholds, CollectorOutcome, CollectorStatus, Finding, FindingSource,
    RunMetadata, Severity, SeverityCounts, ThresholdRule,
};

// 수집기 trait
pub use collector::{Collector, CollectorOutput, ScanContext};

// 취약점 피드
pub use feed::{FeedEntry, StaticFeed, VulnFeed};

// 버전 범위
pub use version::{VersionConstraint, VersionRange};
