//! 집계 불변식 property 테스트
//!
//! 무작위 finding 시퀀스에 대해 멱등성, 중복 제거, 정렬 불변식을
//! 검증합니다.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, SystemTime};

use proptest::prelude::*;

use chainwatch_aggregator::aggregate;
use chainwatch_core::types::{AlertThresholds, Finding, FindingSource, Severity};

fn severity_from(raw: u8) -> Severity {
    match raw % 4 {
        0 => Severity::Low,
        1 => Severity::Medium,
        2 => Severity::High,
        _ => Severity::Critical,
    }
}

fn arb_finding() -> impl Strategy<Value = Finding> {
    (0..6u8, 0..4u8, 0..600u64).prop_map(|(key, severity, secs)| {
        let mut evidence = BTreeMap::new();
        evidence.insert("k".to_owned(), format!("cond-{key}"));
        Finding::new(
            FindingSource::Network,
            "synthetic-condition",
            severity_from(severity),
            SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            evidence,
            &["k"],
        )
    })
}

proptest! {
    #[test]
    fn aggregation_is_idempotent(findings in prop::collection::vec(arb_finding(), 0..80)) {
        let thresholds = AlertThresholds::default();
        let first = aggregate(&findings, &thresholds).unwrap();
        let second = aggregate(&findings, &thresholds).unwrap();

        let first_json = serde_json::to_string(&first).unwrap();
        let second_json = serde_json::to_string(&second).unwrap();
        prop_assert_eq!(first_json, second_json);
    }

    #[test]
    fn at_most_one_alert_per_identity_key(findings in prop::collection::vec(arb_finding(), 0..80)) {
        let alerts = aggregate(&findings, &AlertThresholds::default()).unwrap();
        let mut keys = HashSet::new();
        for alert in &alerts {
            prop_assert!(keys.insert(alert.identity_key.clone()),
                "duplicate alert for identity key {}", alert.identity_key);
        }
    }

    #[test]
    fn alerts_non_increasing_in_severity(findings in prop::collection::vec(arb_finding(), 0..80)) {
        let alerts = aggregate(&findings, &AlertThresholds::default()).unwrap();
        for pair in alerts.windows(2) {
            prop_assert!(pair[0].severity >= pair[1].severity);
            if pair[0].severity == pair[1].severity {
                prop_assert!(pair[0].first_seen <= pair[1].first_seen);
            }
        }
    }

    #[test]
    fn finding_ids_always_index_input(findings in prop::collection::vec(arb_finding(), 0..80)) {
        let alerts = aggregate(&findings, &AlertThresholds::default()).unwrap();
        for alert in &alerts {
            prop_assert!(!alert.finding_ids.is_empty());
            for &idx in &alert.finding_ids {
                prop_assert!(idx < findings.len());
                prop_assert_eq!(&findings[idx].identity_key, &alert.identity_key);
            }
        }
    }
}
