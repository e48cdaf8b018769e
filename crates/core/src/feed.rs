//! 취약점 피드 -- 주입형 읽기 전용 조회 인터페이스
//!
//! [`VulnFeed`]는 수집기에 주입되는 읽기 전용 capability입니다.
//! 모듈 레벨 싱글톤이 아니라 trait 객체로 전달되므로
//! 테스트에서 결정론적 stub 피드로 대체할 수 있습니다.
//!
//! [`StaticFeed`]는 로컬 JSON 문서에서 로드되는 기본 구현입니다.
//!
//! # JSON 형식
//!
//! ```json
//! {
//!   "entries": [
//!     {
//!       "id": "CVE-2024-1234",
//!       "key": "openssl",
//!       "affected": [">=1.0.0, <1.1.1"],
//!       "severity": "Critical",
//!       "fixed_version": "1.1.1",
//!       "summary": "Buffer overflow in ..."
//!     }
//!   ],
//!   "latest": { "openssl": "3.2.0" }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::types::Severity;
use crate::version::VersionRange;

/// 피드 파일 최대 크기 (50 MB)
const MAX_FEED_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 취약점 피드 엔트리
///
/// `key`는 패키지명, 이미지명, 또는 이미지 digest입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    /// 어드바이저리 ID (예: CVE-2024-1234, GHSA-xxxx)
    pub id: String,
    /// 조회 키 (패키지명 / 이미지명 / digest)
    pub key: String,
    /// 영향받는 버전 범위 (비어있으면 버전과 무관하게 영향)
    #[serde(default)]
    pub affected: Vec<VersionRange>,
    /// 심각도 (없으면 소비자가 floor를 적용)
    pub severity: Option<Severity>,
    /// 수정된 버전 (있을 경우)
    pub fixed_version: Option<String>,
    /// 취약점 요약
    #[serde(default)]
    pub summary: String,
}

impl FeedEntry {
    /// 주어진 버전이 이 엔트리의 영향 범위에 포함되는지 확인합니다.
    ///
    /// 범위가 비어있으면 버전과 무관하게 매칭됩니다
    /// (digest 키 엔트리는 버전 개념이 없습니다).
    /// 여러 범위 중 하나라도 매칭되면 `true`를 반환합니다.
    pub fn matches_version(&self, version: &str) -> bool {
        if self.affected.is_empty() {
            return true;
        }
        self.affected.iter().any(|range| range.contains(version))
    }
}

/// 취약점 피드 조회 인터페이스
///
/// 구현체는 지연 시간이 유한해야 하며, 시간 초과는 panic이 아니라
/// [`LookupError::Timeout`]으로 보고해야 합니다.
pub trait VulnFeed: Send + Sync {
    /// 키(패키지명/이미지명/digest)로 취약점 엔트리를 조회합니다.
    fn lookup(&self, key: &str) -> Result<Vec<FeedEntry>, LookupError>;

    /// 패키지의 최신 알려진 버전을 반환합니다 (staleness 검사용).
    ///
    /// 피드가 최신 버전 정보를 제공하지 않으면 `Ok(None)`을 반환합니다.
    fn latest_version(&self, _package: &str) -> Result<Option<String>, LookupError> {
        Ok(None)
    }
}

/// 피드 JSON 문서의 최상위 구조
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FeedDocument {
    /// 취약점 엔트리 목록
    #[serde(default)]
    entries: Vec<FeedEntry>,
    /// 패키지별 최신 알려진 버전
    #[serde(default)]
    latest: HashMap<String, String>,
}

/// 인메모리 취약점 피드
///
/// 사전에 가져온 로컬 JSON 문서에서 로드되며, 프로덕션과 테스트 양쪽에서
/// 사용됩니다. O(1) 조회를 위해 키로 인덱싱된 HashMap을 사용합니다.
pub struct StaticFeed {
    /// 전체 엔트리
    entries: Vec<FeedEntry>,
    /// 키로 인덱싱된 조회 맵
    index: HashMap<String, Vec<usize>>,
    /// 패키지별 최신 버전
    latest: HashMap<String, String>,
}

impl StaticFeed {
    /// 빈 피드를 생성합니다.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    /// 엔트리 목록으로 피드를 생성합니다.
    pub fn from_entries(entries: Vec<FeedEntry>) -> Self {
        let index = Self::build_index(&entries);
        Self {
            entries,
            index,
            latest: HashMap::new(),
        }
    }

    /// 패키지별 최신 버전 정보를 설정합니다.
    pub fn with_latest(mut self, latest: HashMap<String, String>) -> Self {
        self.latest = latest;
        self
    }

    /// JSON 문서에서 피드를 파싱합니다.
    pub fn from_json(json: &str) -> Result<Self, LookupError> {
        let doc: FeedDocument = serde_json::from_str(json)
            .map_err(|e| LookupError::Unavailable(format!("failed to parse feed JSON: {e}")))?;

        let index = Self::build_index(&doc.entries);
        Ok(Self {
            entries: doc.entries,
            index,
            latest: doc.latest,
        })
    }

    /// 로컬 JSON 파일에서 피드를 로드합니다.
    ///
    /// # Note
    ///
    /// 이 함수는 동기 I/O를 수행합니다. async 컨텍스트에서 호출할 때는
    /// `tokio::task::spawn_blocking`으로 감싸세요.
    pub fn load_from_path(path: &Path) -> Result<Self, LookupError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            LookupError::Unavailable(format!("feed file {}: {e}", path.display()))
        })?;

        if metadata.len() > MAX_FEED_FILE_SIZE {
            return Err(LookupError::Unavailable(format!(
                "feed file {} too large: {} bytes (max: {})",
                path.display(),
                metadata.len(),
                MAX_FEED_FILE_SIZE,
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LookupError::Unavailable(format!("feed file {}: {e}", path.display()))
        })?;

        let feed = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            entries = feed.entry_count(),
            "vulnerability feed loaded"
        );
        Ok(feed)
    }

    /// 전체 엔트리 수를 반환합니다.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// 인덱스를 구축합니다.
    fn build_index(entries: &[FeedEntry]) -> HashMap<String, Vec<usize>> {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            index.entry(entry.key.clone()).or_default().push(idx);
        }
        index
    }
}

impl VulnFeed for StaticFeed {
    fn lookup(&self, key: &str) -> Result<Vec<FeedEntry>, LookupError> {
        let entries = match self.index.get(key) {
            Some(indices) => indices
                .iter()
                .filter_map(|&idx| self.entries.get(idx).cloned())
                .collect(),
            None => Vec::new(),
        };
        Ok(entries)
    }

    fn latest_version(&self, package: &str) -> Result<Option<String>, LookupError> {
        Ok(self.latest.get(package).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<FeedEntry> {
        vec![
            FeedEntry {
                id: "CVE-2024-0001".to_owned(),
                key: "openssl".to_owned(),
                affected: vec![VersionRange::parse(">=1.0.0, <1.1.1").unwrap()],
                severity: Some(Severity::Critical),
                fixed_version: Some("1.1.1".to_owned()),
                summary: "Buffer overflow".to_owned(),
            },
            FeedEntry {
                id: "CVE-2024-0002".to_owned(),
                key: "sha256:deadbeef".to_owned(),
                affected: vec![],
                severity: Some(Severity::High),
                fixed_version: None,
                summary: "Vulnerable image digest".to_owned(),
            },
            FeedEntry {
                id: "CVE-2024-0003".to_owned(),
                key: "openssl".to_owned(),
                affected: vec![VersionRange::parse("<0.9.8").unwrap()],
                severity: None,
                fixed_version: Some("0.9.8".to_owned()),
                summary: "Legacy issue".to_owned(),
            },
        ]
    }

    #[test]
    fn empty_feed() {
        let feed = StaticFeed::empty();
        assert_eq!(feed.entry_count(), 0);
        assert!(feed.lookup("anything").unwrap().is_empty());
        assert_eq!(feed.latest_version("anything").unwrap(), None);
    }

    #[test]
    fn lookup_by_key() {
        let feed = StaticFeed::from_entries(sample_entries());
        let results = feed.lookup("openssl").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "CVE-2024-0001");
    }

    #[test]
    fn lookup_by_digest() {
        let feed = StaticFeed::from_entries(sample_entries());
        let results = feed.lookup("sha256:deadbeef").unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn lookup_unknown_key_returns_empty() {
        let feed = StaticFeed::from_entries(sample_entries());
        assert!(feed.lookup("unknown-package").unwrap().is_empty());
    }

    #[test]
    fn entry_matches_version_in_range() {
        let entries = sample_entries();
        assert!(entries[0].matches_version("1.0.5"));
        assert!(!entries[0].matches_version("1.1.1"));
        assert!(!entries[0].matches_version("0.9.0"));
    }

    #[test]
    fn entry_without_ranges_matches_any_version() {
        let entries = sample_entries();
        assert!(entries[1].matches_version("1.0.0"));
        assert!(entries[1].matches_version("99.99.99"));
    }

    #[test]
    fn entry_multiple_ranges_any_match() {
        let entry = FeedEntry {
            id: "CVE-2024-0009".to_owned(),
            key: "multi".to_owned(),
            affected: vec![
                VersionRange::parse(">=1.0.0, <1.0.5").unwrap(),
                VersionRange::parse(">=2.0.0, <2.0.3").unwrap(),
            ],
            severity: Some(Severity::Medium),
            fixed_version: None,
            summary: String::new(),
        };
        assert!(entry.matches_version("1.0.3"));
        assert!(entry.matches_version("2.0.1"));
        assert!(!entry.matches_version("1.5.0"));
    }

    #[test]
    fn from_json_valid_document() {
        let json = r#"{
            "entries": [
                {
                    "id": "CVE-2024-9999",
                    "key": "test-pkg",
                    "affected": ["<2.0.0"],
                    "severity": "Medium",
                    "fixed_version": "2.0.0",
                    "summary": "Test"
                }
            ],
            "latest": { "test-pkg": "2.1.0" }
        }"#;
        let feed = StaticFeed::from_json(json).unwrap();
        assert_eq!(feed.entry_count(), 1);
        assert_eq!(
            feed.latest_version("test-pkg").unwrap(),
            Some("2.1.0".to_owned())
        );
    }

    #[test]
    fn from_json_defaults_missing_sections() {
        let feed = StaticFeed::from_json("{}").unwrap();
        assert_eq!(feed.entry_count(), 0);
    }

    #[test]
    fn from_json_invalid() {
        assert!(StaticFeed::from_json("not json").is_err());
    }

    #[test]
    fn from_json_missing_required_fields() {
        let json = r#"{ "entries": [ { "id": "CVE-2024-0001" } ] }"#;
        assert!(StaticFeed::from_json(json).is_err());
    }

    #[test]
    fn from_json_invalid_range_string() {
        let json = r#"{
            "entries": [
                { "id": "x", "key": "y", "affected": [""], "severity": null, "fixed_version": null }
            ]
        }"#;
        assert!(StaticFeed::from_json(json).is_err());
    }

    #[test]
    fn load_from_path_missing_file() {
        let result = StaticFeed::load_from_path(Path::new("/nonexistent/feed.json"));
        assert!(matches!(result, Err(LookupError::Unavailable(_))));
    }

    #[test]
    fn load_from_path_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(
            &path,
            r#"{ "entries": [ { "id": "CVE-1", "key": "a", "severity": "Low", "fixed_version": null } ] }"#,
        )
        .unwrap();

        let feed = StaticFeed::load_from_path(&path).unwrap();
        assert_eq!(feed.entry_count(), 1);
    }

    #[test]
    fn load_from_path_invalid_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, "invalid json").unwrap();
        assert!(StaticFeed::load_from_path(&path).is_err());
    }

    #[test]
    fn feed_entry_serialize_roundtrip() {
        let entry = FeedEntry {
            id: "CVE-2024-0001".to_owned(),
            key: "openssl".to_owned(),
            affected: vec![VersionRange::parse(">=1.0.0, <1.1.1").unwrap()],
            severity: Some(Severity::Critical),
            fixed_version: Some("1.1.1".to_owned()),
            summary: "test".to_owned(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: FeedEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, entry.id);
        assert_eq!(parsed.affected, entry.affected);
    }

    #[test]
    fn trait_object_lookup() {
        let feed: Box<dyn VulnFeed> = Box::new(StaticFeed::from_entries(sample_entries()));
        assert_eq!(feed.lookup("openssl").unwrap().len(), 2);
    }
}
