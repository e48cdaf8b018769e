//! 네트워크 모니터링 로직 -- 단일 패스 연결 로그 분석
//!
//! [`NetworkMonitor`]는 순서가 있는 연결 로그를 한 번만 순회하며
//! 세 검사를 동시에 수행합니다 (임의 접근 불필요, 대용량 로그에서도
//! 메모리 사용이 유계).
//!
//! # 결정론
//!
//! 모든 윈도우 평가는 레코드 자체의 타임스탬프로 수행되고 추적기 상태는
//! 패스마다 새로 생성되므로, 같은 로그 + 같은 설정이면 호출 시점과
//! 무관하게 항상 동일한 finding 시퀀스를 방출합니다.

use std::collections::BTreeMap;
use std::time::SystemTime;

use metrics::counter;
use tracing::{debug, warn};

use chainwatch_core::collector::{Collector, CollectorOutput, ScanContext};
use chainwatch_core::metrics as m;
use chainwatch_core::types::{Finding, FindingSource, Severity};

use crate::allowlist::Allowlist;
use crate::baseline::RateTracker;
use crate::config::NetworkMonitorConfig;
use crate::error::NetworkMonitorError;
use crate::portscan::PortScanTracker;
use crate::record::{ConnectionRecord, parse_record};

/// 네트워크 연결 로그 모니터
///
/// 생성 시점에 허용 목록을 파싱하며, `monitor()`는 불변 입력에 대한
/// 순수 함수입니다.
pub struct NetworkMonitor {
    /// 모니터 설정
    config: NetworkMonitorConfig,
    /// 파싱된 허용 목록
    allowlist: Allowlist,
}

impl NetworkMonitor {
    /// 새 모니터를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정 또는 허용 목록 엔트리가 유효하지 않으면 에러를 반환합니다.
    pub fn new(config: NetworkMonitorConfig) -> Result<Self, NetworkMonitorError> {
        config.validate()?;
        let allowlist = Allowlist::parse(&config.allowlist)?;
        Ok(Self { config, allowlist })
    }

    /// 연결 로그를 분석하여 finding을 방출합니다.
    ///
    /// 파싱 불가 라인은 건너뛰고 집계합니다. 빈 입력은 finding 없이
    /// 성공합니다.
    pub fn monitor(
        &self,
        raw: &str,
        _ctx: &ScanContext,
    ) -> Result<CollectorOutput, NetworkMonitorError> {
        let mut findings = Vec::new();
        let mut skipped_items = 0usize;

        let mut rate_tracker =
            RateTracker::new(self.config.rate_limit, self.config.rate_window_secs);
        let mut portscan_tracker = PortScanTracker::new(
            self.config.portscan_min_ports,
            self.config.portscan_window_secs,
        );

        for (index, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let record = match parse_record(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(line = index + 1, error = %e, "unparseable connection record, skipping");
                    counter!(m::NETWORK_PARSE_ERRORS_TOTAL).increment(1);
                    skipped_items += 1;
                    continue;
                }
            };

            counter!(m::NETWORK_RECORDS_PROCESSED_TOTAL).increment(1);

            if let Some(finding) = self.check_allowlist(&record) {
                findings.push(finding);
            }

            if let Some(observed) = rate_tracker.observe(record.dst_ip, record.timestamp) {
                findings.push(self.rate_finding(&record, observed));
            }

            if let Some(distinct) = portscan_tracker.observe(
                record.src_ip,
                record.dst_ip,
                record.dst_port,
                record.timestamp,
            ) {
                findings.push(self.portscan_finding(&record, distinct));
            }
        }

        for finding in &findings {
            counter!(
                m::NETWORK_FINDINGS_TOTAL,
                m::LABEL_SEVERITY => finding.severity.to_string().to_lowercase()
            )
            .increment(1);
        }

        debug!(
            findings = findings.len(),
            skipped = skipped_items,
            "network monitoring pass completed"
        );

        Ok(CollectorOutput {
            findings,
            skipped_items,
            degraded: None,
        })
    }

    /// 목적지가 허용 목록에 없으면 finding을 생성합니다.
    fn check_allowlist(&self, record: &ConnectionRecord) -> Option<Finding> {
        if self.allowlist.permits(record.dst_ip, record.dst_port) {
            return None;
        }

        let mut evidence = BTreeMap::new();
        evidence.insert("src_ip".to_owned(), record.src_ip.to_string());
        evidence.insert("dst_ip".to_owned(), record.dst_ip.to_string());
        evidence.insert("dst_port".to_owned(), record.dst_port.to_string());
        evidence.insert("protocol".to_owned(), record.protocol.to_string());

        Some(
            Finding::new(
                FindingSource::Network,
                "unauthorized-connection",
                self.config.unauthorized_severity,
                SystemTime::from(record.timestamp),
                evidence,
                &["dst_ip", "dst_port"],
            )
            .with_recommendation("Investigate suspicious network activity"),
        )
    }

    /// 연결 빈도 기준선 위반 finding을 생성합니다.
    fn rate_finding(&self, record: &ConnectionRecord, observed: usize) -> Finding {
        let mut evidence = BTreeMap::new();
        evidence.insert("peer".to_owned(), record.dst_ip.to_string());
        evidence.insert("observed".to_owned(), observed.to_string());
        evidence.insert("limit".to_owned(), self.config.rate_limit.to_string());
        evidence.insert(
            "window_secs".to_owned(),
            self.config.rate_window_secs.to_string(),
        );

        Finding::new(
            FindingSource::Network,
            "rate-baseline-exceeded",
            Severity::Medium,
            SystemTime::from(record.timestamp),
            evidence,
            &["peer"],
        )
        .with_recommendation("Review connection rate baseline for this peer")
    }

    /// 포트 스캔 시그니처 finding을 생성합니다.
    fn portscan_finding(&self, record: &ConnectionRecord, distinct: usize) -> Finding {
        let mut evidence = BTreeMap::new();
        evidence.insert("src_ip".to_owned(), record.src_ip.to_string());
        evidence.insert("dst_ip".to_owned(), record.dst_ip.to_string());
        evidence.insert("distinct_ports".to_owned(), distinct.to_string());
        evidence.insert(
            "window_secs".to_owned(),
            self.config.portscan_window_secs.to_string(),
        );

        Finding::new(
            FindingSource::Network,
            "port-scan",
            Severity::High,
            SystemTime::from(record.timestamp),
            evidence,
            &["src_ip", "dst_ip"],
        )
        .with_recommendation("Investigate suspicious network activity")
    }
}

impl Collector for NetworkMonitor {
    fn name(&self) -> &'static str {
        "network"
    }

    fn source(&self) -> FindingSource {
        FindingSource::Network
    }

    fn collect(
        &self,
        input: &str,
        ctx: &ScanContext,
    ) -> Result<CollectorOutput, chainwatch_core::error::ChainwatchError> {
        self.monitor(input, ctx).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chainwatch_core::types::CollectorStatus;

    fn ctx() -> ScanContext {
        ScanContext::new(SystemTime::UNIX_EPOCH)
    }

    fn monitor_with(config: NetworkMonitorConfig) -> NetworkMonitor {
        NetworkMonitor::new(config).unwrap()
    }

    fn default_monitor() -> NetworkMonitor {
        monitor_with(NetworkMonitorConfig::default())
    }

    #[test]
    fn empty_log_produces_no_findings() {
        let output = default_monitor().monitor("", &ctx()).unwrap();
        assert!(output.findings.is_empty());
        assert_eq!(output.status(), CollectorStatus::Success);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let log = "\n# comment line\n\n";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        assert!(output.findings.is_empty());
        assert_eq!(output.skipped_items, 0);
    }

    #[test]
    fn allowlisted_destination_is_silent() {
        let log = "2024-01-15T12:00:00Z 10.0.0.5:51234 -> 192.168.1.9:443 tcp 100";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        assert!(output.findings.is_empty());
    }

    #[test]
    fn unauthorized_destination_flagged() {
        let log = "2024-01-15T12:00:00Z 10.0.0.5:51234 -> 203.0.113.9:443 tcp 100";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        assert_eq!(output.findings.len(), 1);
        let finding = &output.findings[0];
        assert_eq!(finding.category, "unauthorized-connection");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.evidence.get("dst_ip").unwrap(), "203.0.113.9");
    }

    #[test]
    fn unauthorized_severity_configurable() {
        let config = NetworkMonitorConfig {
            unauthorized_severity: Severity::Critical,
            ..Default::default()
        };
        let log = "2024-01-15T12:00:00Z 10.0.0.5:51234 -> 203.0.113.9:443 tcp 100";
        let output = monitor_with(config).monitor(log, &ctx()).unwrap();
        assert_eq!(output.findings[0].severity, Severity::Critical);
    }

    #[test]
    fn endpoint_allowlist_permits_single_port() {
        let config = NetworkMonitorConfig {
            allowlist: vec!["203.0.113.9:443".to_owned()],
            ..Default::default()
        };
        let monitor = monitor_with(config);
        let allowed = "2024-01-15T12:00:00Z 10.0.0.5:1 -> 203.0.113.9:443 tcp 100";
        let denied = "2024-01-15T12:00:00Z 10.0.0.5:1 -> 203.0.113.9:80 tcp 100";

        assert!(monitor.monitor(allowed, &ctx()).unwrap().findings.is_empty());
        assert_eq!(monitor.monitor(denied, &ctx()).unwrap().findings.len(), 1);
    }

    #[test]
    fn rate_baseline_violation_at_medium() {
        let config = NetworkMonitorConfig {
            rate_limit: 2,
            rate_window_secs: 60,
            ..Default::default()
        };
        // 허용된 목적지라도 빈도 위반은 별도로 집계
        let log = "\
2024-01-15T12:00:00Z 10.0.0.5:1 -> 192.168.1.9:443 tcp 10
2024-01-15T12:00:01Z 10.0.0.5:2 -> 192.168.1.9:443 tcp 10
2024-01-15T12:00:02Z 10.0.0.5:3 -> 192.168.1.9:443 tcp 10
2024-01-15T12:00:03Z 10.0.0.5:4 -> 192.168.1.9:443 tcp 10";
        let output = monitor_with(config).monitor(log, &ctx()).unwrap();
        let rate_findings: Vec<_> = output
            .findings
            .iter()
            .filter(|f| f.category == "rate-baseline-exceeded")
            .collect();
        assert_eq!(rate_findings.len(), 2);
        assert_eq!(rate_findings[0].severity, Severity::Medium);
        assert_eq!(rate_findings[0].evidence.get("observed").unwrap(), "3");
        // 같은 피어의 반복 위반은 같은 identity key (집계기에서 중복 제거)
        assert_eq!(
            rate_findings[0].identity_key,
            rate_findings[1].identity_key
        );
    }

    #[test]
    fn port_scan_signature_flagged_high() {
        let log = "\
2024-01-15T12:00:00Z 198.51.100.7:40000 -> 192.168.1.9:22 tcp 0
2024-01-15T12:00:01Z 198.51.100.7:40001 -> 192.168.1.9:23 tcp 0
2024-01-15T12:00:02Z 198.51.100.7:40002 -> 192.168.1.9:80 tcp 0
2024-01-15T12:00:03Z 198.51.100.7:40003 -> 192.168.1.9:443 tcp 0
2024-01-15T12:00:04Z 198.51.100.7:40004 -> 192.168.1.9:8080 tcp 0";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        let scan_findings: Vec<_> = output
            .findings
            .iter()
            .filter(|f| f.category == "port-scan")
            .collect();
        assert_eq!(scan_findings.len(), 1);
        assert_eq!(scan_findings[0].severity, Severity::High);
        assert_eq!(scan_findings[0].evidence.get("distinct_ports").unwrap(), "5");
    }

    #[test]
    fn slow_port_probing_outside_window_silent() {
        // 10초 윈도우 밖으로 벌어진 시도는 스캔으로 판정하지 않음
        let log = "\
2024-01-15T12:00:00Z 198.51.100.7:1 -> 192.168.1.9:22 tcp 0
2024-01-15T12:01:00Z 198.51.100.7:2 -> 192.168.1.9:23 tcp 0
2024-01-15T12:02:00Z 198.51.100.7:3 -> 192.168.1.9:80 tcp 0
2024-01-15T12:03:00Z 198.51.100.7:4 -> 192.168.1.9:443 tcp 0
2024-01-15T12:04:00Z 198.51.100.7:5 -> 192.168.1.9:8080 tcp 0";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        assert!(output.findings.iter().all(|f| f.category != "port-scan"));
    }

    #[test]
    fn malformed_lines_skipped_and_counted() {
        let log = "\
2024-01-15T12:00:00Z 10.0.0.5:1 -> 203.0.113.9:443 tcp 100
this is not a record
2024-01-15T12:00:01Z 10.0.0.5:2 -> 203.0.113.9:443 tcp 100";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        assert_eq!(output.skipped_items, 1);
        assert_eq!(output.findings.len(), 2);
        assert_eq!(output.status(), CollectorStatus::Partial);
    }

    #[test]
    fn findings_use_record_timestamps() {
        let log = "2024-01-15T12:00:00Z 10.0.0.5:1 -> 203.0.113.9:443 tcp 100";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        let expected = SystemTime::from(
            chrono::DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z").unwrap(),
        );
        assert_eq!(output.findings[0].timestamp, expected);
    }

    #[test]
    fn deterministic_across_runs() {
        let log = "\
2024-01-15T12:00:00Z 198.51.100.7:1 -> 203.0.113.9:22 tcp 0
2024-01-15T12:00:01Z 198.51.100.7:2 -> 203.0.113.9:23 tcp 0
garbage line
2024-01-15T12:00:02Z 198.51.100.7:3 -> 203.0.113.9:80 tcp 0
2024-01-15T12:00:03Z 198.51.100.7:4 -> 203.0.113.9:443 tcp 0
2024-01-15T12:00:04Z 198.51.100.7:5 -> 203.0.113.9:8080 tcp 0";

        let first = default_monitor().monitor(log, &ctx()).unwrap();
        let second = default_monitor().monitor(log, &ctx()).unwrap();

        assert_eq!(first.findings.len(), second.findings.len());
        let first_json = serde_json::to_string(&first.findings).unwrap();
        let second_json = serde_json::to_string(&second.findings).unwrap();
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn json_and_text_lines_mix() {
        let log = "\
2024-01-15T12:00:00Z 10.0.0.5:1 -> 203.0.113.9:443 tcp 100
{\"timestamp\":\"2024-01-15T12:00:01Z\",\"src_ip\":\"10.0.0.5\",\"src_port\":2,\"dst_ip\":\"203.0.113.9\",\"dst_port\":443,\"protocol\":\"tcp\",\"bytes\":50}";
        let output = default_monitor().monitor(log, &ctx()).unwrap();
        assert_eq!(output.findings.len(), 2);
        assert_eq!(output.skipped_items, 0);
    }

    #[test]
    fn invalid_allowlist_rejected_at_construction() {
        let config = NetworkMonitorConfig {
            allowlist: vec!["10.0.0.0/99".to_owned()],
            ..Default::default()
        };
        assert!(NetworkMonitor::new(config).is_err());
    }

    #[test]
    fn collector_trait_metadata() {
        let monitor = default_monitor();
        assert_eq!(monitor.name(), "network");
        assert_eq!(monitor.source(), FindingSource::Network);
    }
}
