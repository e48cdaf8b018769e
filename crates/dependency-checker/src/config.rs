//! 의존성 검사기 설정

use serde::{Deserialize, Serialize};

use crate::error::DependencyCheckerError;

/// 의존성 검사기 설정
///
/// core의 [`DependencyConfig`](chainwatch_core::config::DependencyConfig)에서
/// 파생됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyCheckerConfig {
    /// 선언된 툴체인 버전 (비어있으면 호환성 검사 생략)
    pub toolchain_version: String,
    /// staleness 판정 major 버전 격차 기준
    pub max_major_lag: u64,
    /// staleness 판정 minor 버전 격차 기준 (같은 major 내)
    pub max_minor_lag: u64,
}

impl Default for DependencyCheckerConfig {
    fn default() -> Self {
        Self::from_core(&chainwatch_core::config::DependencyConfig::default())
    }
}

impl DependencyCheckerConfig {
    /// core의 `DependencyConfig`에서 검사기 설정을 생성합니다.
    pub fn from_core(core: &chainwatch_core::config::DependencyConfig) -> Self {
        Self {
            toolchain_version: core.toolchain_version.clone(),
            max_major_lag: core.max_major_lag,
            max_minor_lag: core.max_minor_lag,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DependencyCheckerError> {
        if self.max_major_lag == 0 {
            return Err(DependencyCheckerError::Config {
                field: "max_major_lag".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.max_minor_lag == 0 {
            return Err(DependencyCheckerError::Config {
                field: "max_minor_lag".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        DependencyCheckerConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = chainwatch_core::config::DependencyConfig {
            enabled: true,
            toolchain_version: "1.75.0".to_owned(),
            max_major_lag: 2,
            max_minor_lag: 6,
        };
        let config = DependencyCheckerConfig::from_core(&core);
        assert_eq!(config.toolchain_version, "1.75.0");
        assert_eq!(config.max_major_lag, 2);
        assert_eq!(config.max_minor_lag, 6);
    }

    #[test]
    fn validate_rejects_zero_lags() {
        let config = DependencyCheckerConfig {
            max_major_lag: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DependencyCheckerConfig {
            max_minor_lag: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
