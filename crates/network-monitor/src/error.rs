//! 네트워크 모니터 에러 타입

use chainwatch_core::error::{ChainwatchError, ConfigError, ParseError};

/// 네트워크 모니터 도메인 에러
///
/// 파싱 불가 로그 라인은 항목 레벨 문제로 건너뛰고 집계되므로
/// 수집기 호출을 실패시키는 에러는 설정 문제뿐입니다.
#[derive(Debug, thiserror::Error)]
pub enum NetworkMonitorError {
    /// 연결 레코드 한 건의 파싱 실패
    #[error("connection record: {reason}")]
    Record {
        /// 실패 사유
        reason: String,
    },

    /// 허용 목록 엔트리 파싱 실패
    #[error("allowlist entry '{entry}': {reason}")]
    InvalidAllowlist {
        /// 문제가 된 엔트리
        entry: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<NetworkMonitorError> for ChainwatchError {
    fn from(err: NetworkMonitorError) -> Self {
        match err {
            NetworkMonitorError::Record { reason } => {
                ChainwatchError::Parse(ParseError::Document { reason })
            }
            NetworkMonitorError::InvalidAllowlist { entry, reason } => {
                ChainwatchError::Config(ConfigError::InvalidValue {
                    field: format!("network.allowlist ('{entry}')"),
                    reason,
                })
            }
            NetworkMonitorError::Config { field, reason } => {
                ChainwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
