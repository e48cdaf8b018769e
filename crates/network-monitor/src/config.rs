//! 네트워크 모니터 설정

use serde::{Deserialize, Serialize};

use chainwatch_core::types::Severity;

use crate::error::NetworkMonitorError;

/// 네트워크 모니터 설정
///
/// core의 [`NetworkConfig`](chainwatch_core::config::NetworkConfig)에서
/// 파생됩니다. 허용 목록 문자열의 파싱은 [`NetworkMonitor`] 생성 시점에
/// 수행됩니다.
///
/// [`NetworkMonitor`]: crate::monitor::NetworkMonitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMonitorConfig {
    /// 허용된 목적지 (IP, CIDR, `ip:port` 엔드포인트)
    pub allowlist: Vec<String>,
    /// 허용 목록 위반 finding의 심각도
    pub unauthorized_severity: Severity,
    /// 피어당 윈도우 내 최대 허용 연결 수
    pub rate_limit: u32,
    /// 연결 빈도 슬라이딩 윈도우 (초)
    pub rate_window_secs: u64,
    /// 포트 스캔 판정에 필요한 최소 고유 포트 수
    pub portscan_min_ports: u32,
    /// 포트 스캔 슬라이딩 윈도우 (초)
    pub portscan_window_secs: u64,
}

impl Default for NetworkMonitorConfig {
    fn default() -> Self {
        Self::from_core(&chainwatch_core::config::NetworkConfig::default())
    }
}

impl NetworkMonitorConfig {
    /// core의 `NetworkConfig`에서 모니터 설정을 생성합니다.
    ///
    /// 심각도 문자열이 해석되지 않으면 기본값 High를 사용합니다.
    pub fn from_core(core: &chainwatch_core::config::NetworkConfig) -> Self {
        let unauthorized_severity =
            Severity::from_str_loose(&core.unauthorized_severity).unwrap_or(Severity::High);
        Self {
            allowlist: core.allowlist.clone(),
            unauthorized_severity,
            rate_limit: core.rate_limit,
            rate_window_secs: core.rate_window_secs,
            portscan_min_ports: core.portscan_min_ports,
            portscan_window_secs: core.portscan_window_secs,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), NetworkMonitorError> {
        if self.rate_limit == 0 {
            return Err(NetworkMonitorError::Config {
                field: "rate_limit".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.rate_window_secs == 0 {
            return Err(NetworkMonitorError::Config {
                field: "rate_window_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.portscan_min_ports < 2 {
            return Err(NetworkMonitorError::Config {
                field: "portscan_min_ports".to_owned(),
                reason: "must be at least 2".to_owned(),
            });
        }
        if self.portscan_window_secs == 0 {
            return Err(NetworkMonitorError::Config {
                field: "portscan_window_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}
