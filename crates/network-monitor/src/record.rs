//! 연결 로그 레코드 파싱
//!
//! 한 줄에 하나의 레코드를 담는 두 형식을 지원합니다.
//!
//! JSON 형식:
//!
//! ```json
//! {"timestamp":"2024-01-15T12:00:00Z","src_ip":"10.0.0.5","src_port":51234,
//!  "dst_ip":"203.0.113.9","dst_port":443,"protocol":"tcp","bytes":1234}
//! ```
//!
//! 평문 형식:
//!
//! ```text
//! 2024-01-15T12:00:00Z 10.0.0.5:51234 -> 203.0.113.9:443 tcp 1234
//! ```
//!
//! 타임스탬프는 RFC 3339입니다. `{`로 시작하는 라인은 JSON으로,
//! 나머지는 평문으로 파싱합니다.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NetworkMonitorError;

/// 연결 프로토콜
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// 기타 프로토콜 (원문 보존)
    Other(String),
}

impl From<String> for Protocol {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            _ => Self::Other(s),
        }
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// 파싱된 연결 레코드 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// 레코드 타임스탬프 (로그 자체의 시각)
    pub timestamp: DateTime<Utc>,
    /// 출발지 IP
    pub src_ip: IpAddr,
    /// 출발지 포트
    pub src_port: u16,
    /// 목적지 IP
    pub dst_ip: IpAddr,
    /// 목적지 포트
    pub dst_port: u16,
    /// 프로토콜
    pub protocol: Protocol,
    /// 전송 바이트 수
    pub bytes: u64,
}

impl fmt::Display for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} -> {}:{} {} {}",
            self.timestamp.to_rfc3339(),
            self.src_ip,
            self.src_port,
            self.dst_ip,
            self.dst_port,
            self.protocol,
            self.bytes,
        )
    }
}

/// 로그 라인 하나를 레코드로 파싱합니다.
pub fn parse_record(line: &str) -> Result<ConnectionRecord, NetworkMonitorError> {
    let line = line.trim();
    if line.starts_with('{') {
        parse_json_line(line)
    } else {
        parse_text_line(line)
    }
}

/// JSON 라인을 파싱합니다.
fn parse_json_line(line: &str) -> Result<ConnectionRecord, NetworkMonitorError> {
    serde_json::from_str(line).map_err(|e| NetworkMonitorError::Record {
        reason: format!("invalid JSON record: {e}"),
    })
}

/// 평문 라인을 파싱합니다.
///
/// 형식: `TIMESTAMP SRC_IP:PORT -> DST_IP:PORT PROTOCOL BYTES`
fn parse_text_line(line: &str) -> Result<ConnectionRecord, NetworkMonitorError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 6 {
        return Err(NetworkMonitorError::Record {
            reason: format!("expected 6 tokens, got {}", tokens.len()),
        });
    }
    if tokens[2] != "->" {
        return Err(NetworkMonitorError::Record {
            reason: "missing '->' separator".to_owned(),
        });
    }

    let timestamp = DateTime::parse_from_rfc3339(tokens[0])
        .map_err(|e| NetworkMonitorError::Record {
            reason: format!("invalid timestamp '{}': {e}", tokens[0]),
        })?
        .with_timezone(&Utc);

    let (src_ip, src_port) = parse_endpoint(tokens[1])?;
    let (dst_ip, dst_port) = parse_endpoint(tokens[3])?;

    let protocol = Protocol::from(tokens[4].to_owned());

    let bytes = tokens[5].parse::<u64>().map_err(|e| NetworkMonitorError::Record {
        reason: format!("invalid byte count '{}': {e}", tokens[5]),
    })?;

    Ok(ConnectionRecord {
        timestamp,
        src_ip,
        src_port,
        dst_ip,
        dst_port,
        protocol,
        bytes,
    })
}

/// `IP:PORT` 엔드포인트를 파싱합니다.
///
/// IPv6는 `[::1]:80` 형태의 대괄호 표기를 사용합니다.
pub fn parse_endpoint(s: &str) -> Result<(IpAddr, u16), NetworkMonitorError> {
    let (ip_str, port_str) = if let Some(rest) = s.strip_prefix('[') {
        let (ip, port) = rest
            .split_once("]:")
            .ok_or_else(|| NetworkMonitorError::Record {
                reason: format!("invalid bracketed endpoint '{s}'"),
            })?;
        (ip, port)
    } else {
        s.rsplit_once(':').ok_or_else(|| NetworkMonitorError::Record {
            reason: format!("endpoint '{s}' missing port"),
        })?
    };

    let ip = ip_str.parse::<IpAddr>().map_err(|e| NetworkMonitorError::Record {
        reason: format!("invalid IP '{ip_str}': {e}"),
    })?;
    let port = port_str.parse::<u16>().map_err(|e| NetworkMonitorError::Record {
        reason: format!("invalid port '{port_str}': {e}"),
    })?;

    Ok((ip, port))
}
