//! 리포트 생성 -- 한 실행의 불변 최종 산출물
//!
//! [`generate`]는 finding, alert, 실행 메타데이터를 [`Report`]로
//! 조립하는 순수 함수입니다. I/O를 수행하지 않으며, 외부 형식으로의
//! 직렬화는 호출자의 책임입니다 (모든 필드가 serde 직렬화 가능).

use std::fmt::Write as _;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use chainwatch_core::types::{Alert, Finding, RunMetadata, Severity, SeverityCounts};

/// 한 스캔 실행의 최종 리포트
///
/// 생성 이후 불변입니다. finding 목록은 탐지 순서를 유지하며,
/// alert의 `finding_ids`는 이 목록 기준 인덱스입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// 탐지 순서의 전체 finding (threshold 미달 그룹 포함)
    pub findings: Vec<Finding>,
    /// threshold를 넘은 alert (심각도 내림차순)
    pub alerts: Vec<Alert>,
    /// 실행 메타데이터
    pub metadata: RunMetadata,
}

/// finding, alert, 메타데이터를 리포트로 조립합니다.
///
/// 심각도별 finding 개수는 여기서 계산되어 메타데이터에 기록됩니다.
pub fn generate(findings: Vec<Finding>, alerts: Vec<Alert>, mut metadata: RunMetadata) -> Report {
    metadata.severity_counts = SeverityCounts::from_findings(&findings);
    Report {
        findings,
        alerts,
        metadata,
    }
}

impl Report {
    /// finding 수를 반환합니다.
    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }

    /// alert 수를 반환합니다.
    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    /// 사람이 읽을 수 있는 텍스트 요약을 생성합니다.
    ///
    /// 출력/저장은 호출자의 책임입니다.
    pub fn summary(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Supply Chain Security Scan Report");
        let _ = writeln!(out, "{}", "=".repeat(33));
        let _ = writeln!(out);

        let _ = writeln!(out, "Run: {}", self.metadata.run_id);
        if let Some(ref failure) = self.metadata.failure {
            let _ = writeln!(out, "Status: FAILED ({failure})");
        } else {
            let _ = writeln!(out, "Status: completed");
        }
        let _ = writeln!(out);

        let alert_counts = self.alert_severity_counts();
        let _ = writeln!(out, "Summary:");
        let _ = writeln!(out, "- CRITICAL severity alerts: {}", alert_counts.critical);
        let _ = writeln!(out, "- HIGH severity alerts: {}", alert_counts.high);
        let _ = writeln!(out, "- MEDIUM severity alerts: {}", alert_counts.medium);
        let _ = writeln!(out, "- LOW severity alerts: {}", alert_counts.low);
        let _ = writeln!(
            out,
            "- findings: {} (skipped items: {})",
            self.findings.len(),
            self.metadata.total_skipped_items(),
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Collectors:");
        for outcome in &self.metadata.collectors {
            let _ = writeln!(out, "- {outcome}");
        }

        if !self.alerts.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Detailed Alerts:");
            for alert in &self.alerts {
                let _ = writeln!(out);
                let _ = writeln!(out, "Severity: {}", alert.severity);
                let _ = writeln!(out, "Category: {}", alert.category);
                let _ = writeln!(out, "Source: {}", alert.source);
                let _ = writeln!(out, "Occurrences: {}", alert.count());
                let _ = writeln!(
                    out,
                    "First seen: {}",
                    unix_timestamp_str(alert.first_seen)
                );
                let _ = writeln!(out, "Last seen: {}", unix_timestamp_str(alert.last_seen));
                if let Some(recommendation) = self.recommendation_for(alert) {
                    let _ = writeln!(out, "Recommendation: {recommendation}");
                }
                let _ = writeln!(out, "{}", "-".repeat(30));
            }
        }

        out
    }

    /// alert의 첫 기여 finding이 가진 권장 대응을 반환합니다.
    fn recommendation_for(&self, alert: &Alert) -> Option<&str> {
        alert
            .finding_ids
            .first()
            .and_then(|&idx| self.findings.get(idx))
            .and_then(|finding| finding.recommendation.as_deref())
    }

    /// alert의 심각도별 개수를 계산합니다.
    fn alert_severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for alert in &self.alerts {
            match alert.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }
}

/// SystemTime을 Unix epoch 초 문자열로 변환합니다.
fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "unknown".to_owned(),
    }
}
