//! 설정 관리 — chainwatch.toml 파싱 및 런타임 설정
//!
//! [`ChainwatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//! 설정 파일의 위치 결정과 로딩은 외부 협력자의 책임이며,
//! core는 TOML 문자열 파싱, 환경변수 오버라이드, 유효성 검증만 제공합니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`CHAINWATCH_NETWORK_RATE_LIMIT=50` 형식)
//! 2. 설정 문자열 (`chainwatch.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```
//! use chainwatch_core::config::ChainwatchConfig;
//!
//! let config = ChainwatchConfig::parse("[general]\nlog_level = \"debug\"").unwrap();
//! assert_eq!(config.general.log_level, "debug");
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ChainwatchError, ConfigError};
use crate::types::{AlertThresholds, Severity};

/// Chainwatch 통합 설정
///
/// `chainwatch.toml`의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Manifest 스캐너 설정
    #[serde(default)]
    pub manifest: ManifestConfig,
    /// 의존성 검사기 설정
    #[serde(default)]
    pub dependency: DependencyConfig,
    /// 네트워크 모니터 설정
    #[serde(default)]
    pub network: NetworkConfig,
    /// 심각도별 alert threshold
    #[serde(default)]
    pub thresholds: AlertThresholds,
    /// 실행 레벨 설정
    #[serde(default)]
    pub run: RunConfig,
}

impl ChainwatchConfig {
    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ChainwatchError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            ChainwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })?;
        Ok(config)
    }

    /// TOML 문자열에서 파싱하고 환경변수 오버라이드와 검증을 적용합니다.
    pub fn load_str(toml_str: &str) -> Result<Self, ChainwatchError> {
        let mut config = Self::parse(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `CHAINWATCH_{SECTION}_{FIELD}`
    /// 예: `CHAINWATCH_NETWORK_RATE_LIMIT=50`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "CHAINWATCH_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "CHAINWATCH_GENERAL_LOG_FORMAT",
        );

        // Manifest
        override_bool(&mut self.manifest.enabled, "CHAINWATCH_MANIFEST_ENABLED");
        override_bool(
            &mut self.manifest.check_freshness,
            "CHAINWATCH_MANIFEST_CHECK_FRESHNESS",
        );
        override_bool(
            &mut self.manifest.check_registry,
            "CHAINWATCH_MANIFEST_CHECK_REGISTRY",
        );
        override_bool(
            &mut self.manifest.check_vulnerabilities,
            "CHAINWATCH_MANIFEST_CHECK_VULNERABILITIES",
        );
        override_u32(
            &mut self.manifest.max_base_image_age_days,
            "CHAINWATCH_MANIFEST_MAX_BASE_IMAGE_AGE_DAYS",
        );
        override_csv(
            &mut self.manifest.trusted_registries,
            "CHAINWATCH_MANIFEST_TRUSTED_REGISTRIES",
        );
        override_csv(
            &mut self.manifest.pinned_base_versions,
            "CHAINWATCH_MANIFEST_PINNED_BASE_VERSIONS",
        );

        // Dependency
        override_bool(&mut self.dependency.enabled, "CHAINWATCH_DEPENDENCY_ENABLED");
        override_string(
            &mut self.dependency.toolchain_version,
            "CHAINWATCH_DEPENDENCY_TOOLCHAIN_VERSION",
        );
        override_u64(
            &mut self.dependency.max_major_lag,
            "CHAINWATCH_DEPENDENCY_MAX_MAJOR_LAG",
        );
        override_u64(
            &mut self.dependency.max_minor_lag,
            "CHAINWATCH_DEPENDENCY_MAX_MINOR_LAG",
        );

        // Network
        override_bool(&mut self.network.enabled, "CHAINWATCH_NETWORK_ENABLED");
        override_csv(&mut self.network.allowlist, "CHAINWATCH_NETWORK_ALLOWLIST");
        override_string(
            &mut self.network.unauthorized_severity,
            "CHAINWATCH_NETWORK_UNAUTHORIZED_SEVERITY",
        );
        override_u32(&mut self.network.rate_limit, "CHAINWATCH_NETWORK_RATE_LIMIT");
        override_u64(
            &mut self.network.rate_window_secs,
            "CHAINWATCH_NETWORK_RATE_WINDOW_SECS",
        );
        override_u32(
            &mut self.network.portscan_min_ports,
            "CHAINWATCH_NETWORK_PORTSCAN_MIN_PORTS",
        );
        override_u64(
            &mut self.network.portscan_window_secs,
            "CHAINWATCH_NETWORK_PORTSCAN_WINDOW_SECS",
        );

        // Run
        override_u64(&mut self.run.timeout_secs, "CHAINWATCH_RUN_TIMEOUT_SECS");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 설정 레벨 에러는 실행 전체에 치명적입니다.
    pub fn validate(&self) -> Result<(), ChainwatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // manifest 검증
        if self.manifest.enabled
            && self.manifest.check_freshness
            && self.manifest.max_base_image_age_days == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "manifest.max_base_image_age_days".to_owned(),
                reason: "must be greater than 0 when freshness check is enabled".to_owned(),
            }
            .into());
        }

        // network 검증
        if self.network.enabled {
            if self.network.rate_limit == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "network.rate_limit".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
            if self.network.rate_window_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "network.rate_window_secs".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
            if self.network.portscan_min_ports < 2 {
                return Err(ConfigError::InvalidValue {
                    field: "network.portscan_min_ports".to_owned(),
                    reason: "must be at least 2".to_owned(),
                }
                .into());
            }
            if self.network.portscan_window_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "network.portscan_window_secs".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
            if Severity::from_str_loose(&self.network.unauthorized_severity).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "network.unauthorized_severity".to_owned(),
                    reason: "must be one of: low, medium, high, critical".to_owned(),
                }
                .into());
            }
        }

        // threshold 검증
        self.thresholds.validate().map_err(|e| {
            ChainwatchError::Config(ConfigError::InvalidValue {
                field: "thresholds".to_owned(),
                reason: e.to_string(),
            })
        })?;

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Manifest 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// base 이미지 신선도 검사 활성화
    pub check_freshness: bool,
    /// 레지스트리 허가 검사 활성화
    pub check_registry: bool,
    /// 알려진 취약점 조회 활성화
    pub check_vulnerabilities: bool,
    /// base 이미지 최대 허용 연령 (일)
    pub max_base_image_age_days: u32,
    /// 허용된 base 이미지 버전 목록 (비어있으면 버전 고정 검사 생략)
    pub pinned_base_versions: Vec<String>,
    /// 신뢰할 수 있는 레지스트리 허용 목록
    pub trusted_registries: Vec<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_freshness: true,
            check_registry: true,
            check_vulnerabilities: true,
            max_base_image_age_days: 180,
            pinned_base_versions: Vec::new(),
            trusted_registries: vec![
                "docker.io".to_owned(),
                "gcr.io".to_owned(),
                "quay.io".to_owned(),
            ],
        }
    }
}

/// 의존성 검사기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 선언된 툴체인 버전 (비어있으면 호환성 검사 생략)
    pub toolchain_version: String,
    /// staleness 판정 major 버전 격차 기준
    pub max_major_lag: u64,
    /// staleness 판정 minor 버전 격차 기준 (같은 major 내)
    pub max_minor_lag: u64,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            toolchain_version: String::new(),
            max_major_lag: 1,
            max_minor_lag: 3,
        }
    }
}

/// 네트워크 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 허용된 목적지 (IP, CIDR, `ip:port` 엔드포인트)
    pub allowlist: Vec<String>,
    /// 허용 목록 위반 finding의 심각도 (low, medium, high, critical)
    pub unauthorized_severity: String,
    /// 피어당 윈도우 내 최대 허용 연결 수
    pub rate_limit: u32,
    /// 연결 빈도 슬라이딩 윈도우 (초)
    pub rate_window_secs: u64,
    /// 포트 스캔 판정에 필요한 최소 고유 포트 수
    pub portscan_min_ports: u32,
    /// 포트 스캔 슬라이딩 윈도우 (초)
    pub portscan_window_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowlist: vec![
                "10.0.0.0/8".to_owned(),
                "172.16.0.0/12".to_owned(),
                "192.168.0.0/16".to_owned(),
                "127.0.0.1".to_owned(),
            ],
            unauthorized_severity: "high".to_owned(),
            rate_limit: 20,
            rate_window_secs: 60,
            portscan_min_ports: 5,
            portscan_window_secs: 10,
        }
    }
}

/// 실행 레벨 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 실행 전체 시간 제한 (초, 0이면 제한 없음)
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
