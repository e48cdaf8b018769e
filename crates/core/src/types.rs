//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 세 수집기(manifest, dependency, network)와 집계기, 오케스트레이터가
//! 공유하는 데이터 구조를 정의합니다. [`Finding`]은 생성 이후 불변이며,
//! 수집기는 방출한 finding을 절대 수정하지 않습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::AggregateError;

/// 심각도 레벨
///
/// 보안 finding과 alert의 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 낮은 심각도
    #[default]
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Finding을 생성한 수집기 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    /// 컨테이너 manifest 스캐너
    Manifest,
    /// 패키지 의존성 검사기
    Dependency,
    /// 네트워크 연결 로그 모니터
    Network,
}

impl fmt::Display for FindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest => write!(f, "manifest"),
            Self::Dependency => write!(f, "dependency"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// 단일 탐지 결과
///
/// 하나의 수집기가 탐지한 하나의 조건을 나타냅니다.
/// 생성 이후 불변이며, 집계기는 읽기 전용으로만 소비합니다.
///
/// # Identity key
///
/// `identity_key`는 `(source, category, 증거 일부)`에서 결정론적으로 유도되며
/// 동일한 underlying 조건에 대해 실행 간에 항상 같은 값을 가집니다.
/// 집계기의 중복 제거 키로 사용됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// 생성 수집기
    pub source: FindingSource,
    /// 탐지 분류 태그 (예: "outdated-base-image", "known-vulnerability")
    pub category: String,
    /// 수집기가 부여한 심각도
    pub severity: Severity,
    /// 증거 key/value 페이로드 — 집계기에는 불투명
    ///
    /// `BTreeMap`이므로 직렬화 순서가 결정론적입니다.
    pub evidence: BTreeMap<String, String>,
    /// 권장 대응 (있을 경우)
    pub recommendation: Option<String>,
    /// 중복 제거용 결정론적 키
    pub identity_key: String,
    /// Finding 생성 시각
    ///
    /// 네트워크 finding은 위반 레코드 자체의 타임스탬프,
    /// manifest/dependency finding은 해당 실행의 scan_time을 사용합니다.
    pub timestamp: SystemTime,
}

impl Finding {
    /// 새 finding을 생성합니다.
    ///
    /// `identity_fields`는 증거 중 identity에 포함할 키 목록입니다.
    /// 나열된 순서대로 키에 반영되며, 증거에 없는 키는 건너뜁니다.
    pub fn new(
        source: FindingSource,
        category: impl Into<String>,
        severity: Severity,
        timestamp: SystemTime,
        evidence: BTreeMap<String, String>,
        identity_fields: &[&str],
    ) -> Self {
        let category = category.into();
        let identity_key = derive_identity_key(source, &category, &evidence, identity_fields);
        Self {
            source,
            category,
            severity,
            evidence,
            recommendation: None,
            identity_key,
            timestamp,
        }
    }

    /// 권장 대응을 설정합니다.
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({})",
            self.severity, self.category, self.source,
        )
    }
}

/// `(source, category, 증거 일부)`에서 identity key를 유도합니다.
///
/// 형식: `{source}:{category}:{k1}={v1}:{k2}={v2}`
/// 같은 조건은 실행 간에 항상 같은 키를 생성합니다.
pub fn derive_identity_key(
    source: FindingSource,
    category: &str,
    evidence: &BTreeMap<String, String>,
    identity_fields: &[&str],
) -> String {
    let mut key = format!("{source}:{category}");
    for field in identity_fields {
        if let Some(value) = evidence.get(*field) {
            key.push(':');
            key.push_str(field);
            key.push('=');
            key.push_str(value);
        }
    }
    key
}

/// 심각도별 threshold 규칙
///
/// `window_secs`가 설정되면 finding 타임스탬프 기준 슬라이딩 윈도우 내에서
/// `min_count`개 이상 발생해야 alert가 생성됩니다.
/// 설정되지 않으면 실행 전체에서 `min_count`개 이상이면 충분합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// alert 생성에 필요한 최소 발생 횟수
    pub min_count: u32,
    /// 발생 횟수를 세는 슬라이딩 윈도우 (초, None이면 실행 전체)
    pub window_secs: Option<u64>,
}

impl ThresholdRule {
    /// 발생 1회로 즉시 alert를 생성하는 규칙
    pub fn immediate() -> Self {
        Self {
            min_count: 1,
            window_secs: None,
        }
    }
}

/// 심각도별 alert threshold — 설정에서 주입되며 core는 수정하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Critical finding 규칙
    pub critical: ThresholdRule,
    /// High finding 규칙
    pub high: ThresholdRule,
    /// Medium finding 규칙
    pub medium: ThresholdRule,
    /// Low finding 규칙
    pub low: ThresholdRule,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            critical: ThresholdRule::immediate(),
            high: ThresholdRule::immediate(),
            medium: ThresholdRule {
                min_count: 3,
                window_secs: None,
            },
            low: ThresholdRule {
                min_count: 5,
                window_secs: Some(300),
            },
        }
    }
}

impl AlertThresholds {
    /// 주어진 심각도에 적용되는 규칙을 반환합니다.
    pub fn rule_for(&self, severity: Severity) -> ThresholdRule {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// threshold 설정의 유효성을 검증합니다.
    ///
    /// `min_count`가 0인 규칙은 집계 불가능한 설정입니다.
    pub fn validate(&self) -> Result<(), AggregateError> {
        for (severity, rule) in [
            (Severity::Critical, self.critical),
            (Severity::High, self.high),
            (Severity::Medium, self.medium),
            (Severity::Low, self.low),
        ] {
            if rule.min_count == 0 {
                return Err(AggregateError::InvalidThreshold {
                    severity: severity.to_string(),
                    reason: "min_count must be greater than 0".to_owned(),
                });
            }
            if let Some(window) = rule.window_secs
                && window == 0
            {
                return Err(AggregateError::InvalidThreshold {
                    severity: severity.to_string(),
                    reason: "window_secs must be greater than 0 when set".to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// 보안 alert
///
/// 같은 `identity_key`를 공유하는 finding 그룹이 threshold를 넘었을 때
/// 생성됩니다. 한 실행에서 identity key당 최대 하나만 존재합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 그룹의 identity key
    pub identity_key: String,
    /// 생성 수집기
    pub source: FindingSource,
    /// 탐지 분류 태그
    pub category: String,
    /// 기여 finding 중 최대 심각도
    pub severity: Severity,
    /// 기여 finding의 인덱스 (리포트의 finding 목록 기준)
    pub finding_ids: Vec<usize>,
    /// 최초 발생 시각
    pub first_seen: SystemTime,
    /// 마지막 발생 시각
    pub last_seen: SystemTime,
}

impl Alert {
    /// 기여 finding 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.finding_ids.len()
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) x{}",
            self.severity,
            self.category,
            self.source,
            self.finding_ids.len(),
        )
    }
}

/// 수집기 실행 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorStatus {
    /// 전체 성공
    Success,
    /// 일부 항목 건너뜀 또는 기능 저하 상태로 완료
    Partial,
    /// 수집기 자체가 실패 (문서 파싱 불가 등)
    Failed,
    /// 설정으로 비활성화되었거나 입력이 없어 실행하지 않음
    Skipped,
}

impl fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// 수집기별 실행 기록
///
/// 리포트 소비자가 커버리지 신뢰도를 판단할 수 있도록
/// 실패한 실행에서도 항상 기록됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorOutcome {
    /// 수집기 이름
    pub name: String,
    /// 실행 결과 상태
    pub status: CollectorStatus,
    /// 방출한 finding 수
    pub findings: usize,
    /// 건너뛴 항목 수 (잘못된 의존성 엔트리, 파싱 불가 로그 라인 등)
    pub skipped_items: usize,
    /// 수집기 레벨 에러 (있을 경우)
    pub error: Option<String>,
}

impl CollectorOutcome {
    /// 실행하지 않은 수집기의 기록을 생성합니다.
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CollectorStatus::Skipped,
            findings: 0,
            skipped_items: 0,
            error: None,
        }
    }

    /// 실패한 수집기의 기록을 생성합니다.
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CollectorStatus::Failed,
            findings: 0,
            skipped_items: 0,
            error: Some(error.into()),
        }
    }
}

impl fmt::Display for CollectorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} findings={} skipped={}",
            self.name, self.status, self.findings, self.skipped_items,
        )
    }
}

/// 심각도별 finding 개수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    /// finding 목록에서 심각도별 개수를 계산합니다.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    /// 전체 finding 수를 반환합니다.
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// 실행 메타데이터
///
/// 한 번의 스캔 실행에 대한 전체 기록입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// 실행 고유 ID
    pub run_id: String,
    /// 실행 시작 시각
    pub started_at: SystemTime,
    /// 실행 종료 시각
    pub finished_at: SystemTime,
    /// 수집기별 실행 기록
    pub collectors: Vec<CollectorOutcome>,
    /// 심각도별 finding 개수
    pub severity_counts: SeverityCounts,
    /// 실행 전체를 실패시킨 원인 (Failed 실행에서만 설정)
    pub failure: Option<String>,
}

impl RunMetadata {
    /// 실행이 실패로 끝났는지 반환합니다.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// 전체 건너뛴 항목 수를 반환합니다.
    pub fn total_skipped_items(&self) -> usize {
        self.collectors.iter().map(|c| c.skipped_items).sum()
    }
}
