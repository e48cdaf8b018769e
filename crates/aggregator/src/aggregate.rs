//! Alert 집계 -- 그룹화, threshold 평가, 중복 제거, 정렬
//!
//! [`aggregate`]는 병합된 finding 목록에 대한 순수 함수입니다.
//! 같은 입력에 대해 항상 같은 alert 집합을 생성하며 (멱등),
//! threshold 평가는 finding 자체의 타임스탬프만 사용합니다
//! (집계 시점의 시계를 읽지 않음).
//!
//! # 중복 제거와 debounce
//!
//! 같은 `identity_key`를 공유하는 finding은 하나의 그룹으로 합쳐지고,
//! 그룹당 최대 하나의 alert만 생성됩니다. 그룹의 뒤따르는 finding은
//! `last_seen`을 연장하고 `finding_ids`에 추가될 뿐 alert를 중복
//! 생성하지 않습니다.
//!
//! # 정렬
//!
//! 심각도 내림차순, 동률이면 `first_seen` 오름차순, 그래도 동률이면
//! identity key 오름차순. 전순서이므로 수집기 완료 순서와 무관하게
//! 출력이 안정적입니다.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, SystemTime};

use metrics::counter;
use tracing::debug;

use chainwatch_core::error::AggregateError;
use chainwatch_core::metrics as m;
use chainwatch_core::types::{Alert, AlertThresholds, Finding, Severity, ThresholdRule};

/// finding 목록을 집계하여 threshold를 넘은 그룹마다 alert를 생성합니다.
///
/// `finding_ids`는 입력 슬라이스(= 리포트의 finding 목록) 기준
/// 인덱스입니다. threshold 미달 그룹은 alert 없이 유지됩니다
/// (finding 자체는 리포트에 남습니다).
///
/// # Errors
///
/// threshold 설정이 유효하지 않으면 `AggregateError::InvalidThreshold`를
/// 반환합니다. finding이 없는 입력은 빈 alert 목록으로 성공합니다.
pub fn aggregate(
    findings: &[Finding],
    thresholds: &AlertThresholds,
) -> Result<Vec<Alert>, AggregateError> {
    thresholds.validate()?;

    // identity key별 그룹화 (최초 등장 순서 유지)
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, finding) in findings.iter().enumerate() {
        match groups.entry(finding.identity_key.as_str()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(idx),
            Entry::Vacant(entry) => {
                order.push(finding.identity_key.as_str());
                entry.insert(vec![idx]);
            }
        }
    }

    let mut alerts = Vec::new();
    let mut below_threshold = 0usize;

    for key in order {
        let indices = &groups[key];

        let severity = indices
            .iter()
            .map(|&idx| findings[idx].severity)
            .max()
            .unwrap_or(Severity::Low);
        let rule = thresholds.rule_for(severity);

        if !meets_threshold(findings, indices, rule) {
            below_threshold += 1;
            debug!(
                identity_key = key,
                occurrences = indices.len(),
                min_count = rule.min_count,
                "finding group below threshold, retained without alert"
            );
            continue;
        }

        let first_seen = indices
            .iter()
            .map(|&idx| findings[idx].timestamp)
            .min()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let last_seen = indices
            .iter()
            .map(|&idx| findings[idx].timestamp)
            .max()
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let representative = &findings[indices[0]];
        alerts.push(Alert {
            identity_key: key.to_owned(),
            source: representative.source,
            category: representative.category.clone(),
            severity,
            finding_ids: indices.clone(),
            first_seen,
            last_seen,
        });
    }

    // 심각도 내림차순, first_seen 오름차순, identity key 오름차순
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
            .then_with(|| a.identity_key.cmp(&b.identity_key))
    });

    for alert in &alerts {
        counter!(
            m::AGGREGATOR_ALERTS_TOTAL,
            m::LABEL_SEVERITY => alert.severity.to_string().to_lowercase()
        )
        .increment(1);
    }
    if below_threshold > 0 {
        counter!(m::AGGREGATOR_GROUPS_BELOW_THRESHOLD_TOTAL).increment(below_threshold as u64);
    }

    debug!(
        findings = findings.len(),
        alerts = alerts.len(),
        below_threshold,
        "aggregation completed"
    );

    Ok(alerts)
}

/// 그룹이 threshold 규칙을 만족하는지 평가합니다.
///
/// 윈도우가 설정된 규칙은 finding 타임스탬프를 정렬한 뒤 투 포인터로
/// `window_secs` 이내에 `min_count`개가 몰린 구간이 있는지 확인합니다.
/// 경계는 폐구간입니다: 정확히 `window_secs` 벌어진 두 finding은
/// 같은 윈도우에 속합니다.
fn meets_threshold(findings: &[Finding], indices: &[usize], rule: ThresholdRule) -> bool {
    let min_count = rule.min_count as usize;

    let Some(window_secs) = rule.window_secs else {
        return indices.len() >= min_count;
    };

    let mut times: Vec<SystemTime> = indices.iter().map(|&idx| findings[idx].timestamp).collect();
    times.sort();

    let window = Duration::from_secs(window_secs);
    let mut start = 0;
    for end in 0..times.len() {
        while times[end]
            .duration_since(times[start])
            .unwrap_or_default()
            > window
        {
            start += 1;
        }
        if end - start + 1 >= min_count {
            return true;
        }
    }
    false
}
