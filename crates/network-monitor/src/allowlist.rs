//! 목적지 허용 목록 -- IP / CIDR / 엔드포인트 매칭
//!
//! 허용 목록 엔트리는 세 형태를 지원합니다.
//!
//! - CIDR 범위: `"10.0.0.0/8"`, `"2001:db8::/32"`
//! - 단일 IP: `"127.0.0.1"` (모든 포트 허용)
//! - 엔드포인트: `"203.0.113.10:443"` (해당 포트만 허용)

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::error::NetworkMonitorError;
use crate::record::parse_endpoint;

/// 허용 목록 엔트리 하나
#[derive(Debug, Clone, PartialEq, Eq)]
enum AllowlistEntry {
    /// CIDR 범위 또는 단일 IP (호스트 네트워크)
    Network(IpNetwork),
    /// 특정 포트만 허용하는 엔드포인트
    Endpoint { ip: IpAddr, port: u16 },
}

/// 파싱된 목적지 허용 목록
#[derive(Debug, Clone)]
pub struct Allowlist {
    entries: Vec<AllowlistEntry>,
}

impl Allowlist {
    /// 패턴 문자열 목록에서 허용 목록을 파싱합니다.
    ///
    /// 파싱 불가능한 엔트리는 설정 레벨 에러입니다.
    pub fn parse(patterns: &[String]) -> Result<Self, NetworkMonitorError> {
        let mut entries = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return Err(NetworkMonitorError::InvalidAllowlist {
                    entry: pattern.to_owned(),
                    reason: "empty entry".to_owned(),
                });
            }

            if pattern.contains('/') {
                let network = pattern.parse::<IpNetwork>().map_err(|e| {
                    NetworkMonitorError::InvalidAllowlist {
                        entry: pattern.to_owned(),
                        reason: e.to_string(),
                    }
                })?;
                entries.push(AllowlistEntry::Network(network));
            } else if let Ok(ip) = pattern.parse::<IpAddr>() {
                entries.push(AllowlistEntry::Network(IpNetwork::from(ip)));
            } else {
                let (ip, port) =
                    parse_endpoint(pattern).map_err(|e| NetworkMonitorError::InvalidAllowlist {
                        entry: pattern.to_owned(),
                        reason: e.to_string(),
                    })?;
                entries.push(AllowlistEntry::Endpoint { ip, port });
            }
        }

        Ok(Self { entries })
    }

    /// 엔트리 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 허용 목록이 비어있는지 반환합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 목적지 `(ip, port)`가 허용되는지 확인합니다.
    pub fn permits(&self, ip: IpAddr, port: u16) -> bool {
        self.entries.iter().any(|entry| match entry {
            AllowlistEntry::Network(network) => network.contains(ip),
            AllowlistEntry::Endpoint {
                ip: allowed_ip,
                port: allowed_port,
            } => *allowed_ip == ip && *allowed_port == port,
        })
    }
}
