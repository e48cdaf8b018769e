//! Manifest 스캐너 에러 타입
//!
//! [`ManifestScannerError`]는 스캐너 모듈 내의 모든 에러를 나타내며,
//! `From<ManifestScannerError> for ChainwatchError` 구현으로
//! 상위 에러 타입으로 전파됩니다.

use chainwatch_core::error::{ChainwatchError, ConfigError, LookupError, ParseError};

/// Manifest 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ManifestScannerError {
    /// 특정 필드가 잘못된 manifest
    #[error("manifest field '{field}': {reason}")]
    Field {
        /// 문제가 된 필드명
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 문서 전체 파싱 실패
    #[error("manifest document: {0}")]
    Document(String),

    /// 취약점 피드 조회 실패
    #[error("feed lookup: {0}")]
    Lookup(#[from] LookupError),

    /// 설정 에러
    #[error("config: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<ManifestScannerError> for ChainwatchError {
    fn from(err: ManifestScannerError) -> Self {
        match err {
            ManifestScannerError::Field { field, reason } => {
                ChainwatchError::Parse(ParseError::Field { field, reason })
            }
            ManifestScannerError::Document(reason) => {
                ChainwatchError::Parse(ParseError::Document { reason })
            }
            ManifestScannerError::Lookup(e) => ChainwatchError::Lookup(e),
            ManifestScannerError::Config { field, reason } => {
                ChainwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_error_display() {
        let err = ManifestScannerError::Field {
            field: "baseImage".to_owned(),
            reason: "expected object".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("baseImage"));
        assert!(msg.contains("expected object"));
    }

    #[test]
    fn converts_to_parse_error() {
        let err = ManifestScannerError::Field {
            field: "image".to_owned(),
            reason: "missing".to_owned(),
        };
        let top: ChainwatchError = err.into();
        assert!(matches!(
            top,
            ChainwatchError::Parse(ParseError::Field { .. })
        ));
    }

    #[test]
    fn converts_to_lookup_error() {
        let err = ManifestScannerError::Lookup(LookupError::Timeout { secs: 3 });
        let top: ChainwatchError = err.into();
        assert!(matches!(top, ChainwatchError::Lookup(_)));
    }

    #[test]
    fn converts_to_config_error() {
        let err = ManifestScannerError::Config {
            field: "trusted_registries".to_owned(),
            reason: "empty".to_owned(),
        };
        let top: ChainwatchError = err.into();
        assert!(matches!(top, ChainwatchError::Config(_)));
    }
}
