//! 로깅 초기화 -- tracing subscriber 설정
//!
//! 라이브러리 자체는 `tracing` 매크로만 사용하며 subscriber를 설치하지
//! 않습니다. 이 모듈은 엔진을 임베드하는 쪽(테스트, 데몬, CLI 등)이
//! general 설정으로 전역 subscriber를 한 번 설치할 때 사용하는
//! 편의 함수입니다.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use chainwatch_core::config::GeneralConfig;

/// general 설정에 따라 전역 tracing subscriber를 설치합니다.
///
/// `RUST_LOG` 환경변수가 있으면 설정의 `log_level`보다 우선합니다.
///
/// # Errors
///
/// subscriber가 이미 설치되어 있으면 에러를 반환합니다.
pub fn init(general: &GeneralConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&general.log_level));

    match general.log_format.as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?,
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_failure() {
        let general = GeneralConfig::default();
        // 첫 설치는 성공하거나 (다른 테스트가 먼저 설치했다면) 실패할 수 있음
        let first = init(&general);
        // 두 번째 설치는 반드시 실패
        let second = init(&general);
        if first.is_ok() {
            assert!(second.is_err());
        }
    }
}
