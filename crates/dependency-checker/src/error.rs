//! 의존성 검사기 에러 타입

use chainwatch_core::error::{ChainwatchError, ConfigError, LookupError, ParseError};

/// 의존성 검사기 도메인 에러
///
/// 항목 레벨 문제(잘못된 엔트리 하나)는 에러가 아니라 건너뛴 항목으로
/// 집계되므로 여기에 나타나지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum DependencyCheckerError {
    /// 특정 필드가 잘못된 선언 문서
    #[error("declaration field '{field}': {reason}")]
    Field {
        /// 문제가 된 필드명
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 문서 전체 파싱 실패
    #[error("declaration document: {0}")]
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

impl From<DependencyCheckerError> for ChainwatchError {
    fn from(err: DependencyCheckerError) -> Self {
        match err {
            DependencyCheckerError::Field { field, reason } => {
                ChainwatchError::Parse(ParseError::Field { field, reason })
            }
            DependencyCheckerError::Document(reason) => {
                ChainwatchError::Parse(ParseError::Document { reason })
            }
            DependencyCheckerError::Lookup(e) => ChainwatchError::Lookup(e),
            DependencyCheckerError::Config { field, reason } => {
                ChainwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
