//! Manifest 스캐너 설정
//!
//! [`ManifestScannerConfig`]는 core의
//! [`ManifestConfig`](chainwatch_core::config::ManifestConfig)에서 파생됩니다.

use serde::{Deserialize, Serialize};

use crate::error::ManifestScannerError;

/// Manifest 스캐너 설정
///
/// 세 검사(신선도, 레지스트리, 취약점)는 각각 독립적으로 토글됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestScannerConfig {
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

impl Default for ManifestScannerConfig {
    fn default() -> Self {
        Self::from_core(&chainwatch_core::config::ManifestConfig::default())
    }
}

impl ManifestScannerConfig {
    /// core의 `ManifestConfig`에서 스캐너 설정을 생성합니다.
    pub fn from_core(core: &chainwatch_core::config::ManifestConfig) -> Self {
        Self {
            check_freshness: core.check_freshness,
            check_registry: core.check_registry,
            check_vulnerabilities: core.check_vulnerabilities,
            max_base_image_age_days: core.max_base_image_age_days,
            pinned_base_versions: core.pinned_base_versions.clone(),
            trusted_registries: core.trusted_registries.clone(),
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ManifestScannerError> {
        if self.check_freshness && self.max_base_image_age_days == 0 {
            return Err(ManifestScannerError::Config {
                field: "max_base_image_age_days".to_owned(),
                reason: "must be greater than 0 when freshness check is enabled".to_owned(),
            });
        }

        if self.check_registry && self.trusted_registries.is_empty() {
            return Err(ManifestScannerError::Config {
                field: "trusted_registries".to_owned(),
                reason: "at least one trusted registry required when registry check is enabled"
                    .to_owned(),
            });
        }

        if self
            .trusted_registries
            .iter()
            .any(|registry| registry.trim().is_empty())
        {
            return Err(ManifestScannerError::Config {
                field: "trusted_registries".to_owned(),
                reason: "registry entries must not be empty".to_owned(),
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
        ManifestScannerConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = chainwatch_core::config::ManifestConfig {
            enabled: true,
            check_freshness: false,
            check_registry: true,
            check_vulnerabilities: true,
            max_base_image_age_days: 90,
            pinned_base_versions: vec!["3.19".to_owned()],
            trusted_registries: vec!["registry.internal.example.com".to_owned()],
        };
        let config = ManifestScannerConfig::from_core(&core);
        assert!(!config.check_freshness);
        assert_eq!(config.max_base_image_age_days, 90);
        assert_eq!(config.pinned_base_versions, vec!["3.19"]);
        assert_eq!(
            config.trusted_registries,
            vec!["registry.internal.example.com"]
        );
    }

    #[test]
    fn validate_rejects_zero_max_age() {
        let config = ManifestScannerConfig {
            max_base_image_age_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_zero_max_age_when_check_disabled() {
        let config = ManifestScannerConfig {
            check_freshness: false,
            max_base_image_age_days: 0,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_empty_trusted_registries() {
        let config = ManifestScannerConfig {
            trusted_registries: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_registry_entry() {
        let config = ManifestScannerConfig {
            trusted_registries: vec!["docker.io".to_owned(), "  ".to_owned()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
