//! 의존성 선언 문서 파싱
//!
//! 두 가지 JSON 형식을 지원합니다.
//!
//! 구조화 형식 (권장, 배열이므로 순서 보존):
//!
//! ```json
//! {
//!   "source": "registry.example.com",
//!   "packages": [
//!     { "name": "openssl", "version": "1.1.1" },
//!     { "name": "lodash", "version": "4.17.20", "requiresToolchain": ">=1.70" }
//!   ]
//! }
//! ```
//!
//! 평면 형식 (레거시, `{패키지: 버전}` 맵):
//!
//! ```json
//! { "requests": "2.28.0", "pyyaml": "5.4.1" }
//! ```
//!
//! 잘못된 엔트리 하나는 경고와 함께 건너뛰고 집계할 뿐, 나머지 엔트리의
//! 파싱을 중단시키지 않습니다. 문서 전체가 JSON이 아닐 때만 에러입니다.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DependencyCheckerError;

/// 선언 문서 최대 크기 (5 MB)
const MAX_DECLARATION_SIZE: usize = 5 * 1024 * 1024;

/// 선언된 패키지 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    /// 패키지 이름
    pub name: String,
    /// 선언된 버전
    pub version: String,
    /// 요구 툴체인 제약 (예: ">=1.70", 있을 경우)
    #[serde(default)]
    pub requires_toolchain: Option<String>,
}

/// 파싱된 의존성 선언
#[derive(Debug, Clone)]
pub struct DependencyDeclaration {
    /// 선언된 소스 저장소 (있을 경우)
    pub source: Option<String>,
    /// 선언 순서를 유지한 패키지 목록
    pub packages: Vec<PackageEntry>,
    /// 건너뛴 잘못된 엔트리 수
    pub skipped_items: usize,
}

/// 원시 JSON 문서를 의존성 선언으로 파싱합니다.
pub fn parse_declaration(raw: &str) -> Result<DependencyDeclaration, DependencyCheckerError> {
    if raw.len() > MAX_DECLARATION_SIZE {
        return Err(DependencyCheckerError::Document(format!(
            "declaration too large: {} bytes (max: {})",
            raw.len(),
            MAX_DECLARATION_SIZE,
        )));
    }

    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| DependencyCheckerError::Document(format!("invalid JSON: {e}")))?;

    let obj = value
        .as_object()
        .ok_or_else(|| DependencyCheckerError::Document("expected JSON object".to_owned()))?;

    let source = obj
        .get("source")
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned);

    if let Some(packages_value) = obj.get("packages") {
        let items = packages_value
            .as_array()
            .ok_or_else(|| DependencyCheckerError::Field {
                field: "packages".to_owned(),
                reason: "expected array".to_owned(),
            })?;
        let (packages, skipped_items) = parse_structured(items);
        Ok(DependencyDeclaration {
            source,
            packages,
            skipped_items,
        })
    } else {
        let (packages, skipped_items) = parse_flat(obj);
        Ok(DependencyDeclaration {
            source,
            packages,
            skipped_items,
        })
    }
}

/// 구조화 형식의 패키지 배열을 엔트리 단위로 변환합니다.
///
/// 변환에 실패한 엔트리는 건너뛰고 개수만 집계합니다.
fn parse_structured(items: &[serde_json::Value]) -> (Vec<PackageEntry>, usize) {
    let mut packages = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for (index, item) in items.iter().enumerate() {
        match serde_json::from_value::<PackageEntry>(item.clone()) {
            Ok(entry) if !entry.name.trim().is_empty() && !entry.version.trim().is_empty() => {
                packages.push(entry);
            }
            Ok(_) => {
                warn!(index, "dependency entry has empty name or version, skipping");
                skipped += 1;
            }
            Err(e) => {
                warn!(index, error = %e, "malformed dependency entry, skipping");
                skipped += 1;
            }
        }
    }

    (packages, skipped)
}

/// 평면 `{패키지: 버전}` 맵을 엔트리 목록으로 변환합니다.
///
/// 문자열이 아닌 값은 건너뛰고 집계합니다. `source` 키는 예약어입니다.
fn parse_flat(obj: &serde_json::Map<String, serde_json::Value>) -> (Vec<PackageEntry>, usize) {
    let mut packages = Vec::new();
    let mut skipped = 0;

    for (name, value) in obj {
        if name == "source" {
            continue;
        }
        match value.as_str() {
            Some(version) if !version.trim().is_empty() && !name.trim().is_empty() => {
                packages.push(PackageEntry {
                    name: name.clone(),
                    version: version.to_owned(),
                    requires_toolchain: None,
                });
            }
            _ => {
                warn!(package = %name, "non-string or empty version in flat declaration, skipping");
                skipped += 1;
            }
        }
    }

    (packages, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structured_form() {
        let raw = r#"{
            "source": "registry.example.com",
            "packages": [
                { "name": "openssl", "version": "1.1.1" },
                { "name": "lodash", "version": "4.17.20", "requiresToolchain": ">=1.70" }
            ]
        }"#;
        let decl = parse_declaration(raw).unwrap();
        assert_eq!(decl.source.as_deref(), Some("registry.example.com"));
        assert_eq!(decl.packages.len(), 2);
        assert_eq!(decl.packages[0].name, "openssl");
        assert_eq!(
            decl.packages[1].requires_toolchain.as_deref(),
            Some(">=1.70")
        );
        assert_eq!(decl.skipped_items, 0);
    }

    #[test]
    fn structured_form_preserves_order() {
        let raw = r#"{
            "packages": [
                { "name": "zzz", "version": "1.0.0" },
                { "name": "aaa", "version": "2.0.0" }
            ]
        }"#;
        let decl = parse_declaration(raw).unwrap();
        assert_eq!(decl.packages[0].name, "zzz");
        assert_eq!(decl.packages[1].name, "aaa");
    }

    #[test]
    fn parses_flat_form() {
        let raw = r#"{ "requests": "2.28.0", "pyyaml": "5.4.1" }"#;
        let decl = parse_declaration(raw).unwrap();
        assert_eq!(decl.packages.len(), 2);
        assert!(decl.packages.iter().any(|p| p.name == "requests"));
        assert_eq!(decl.skipped_items, 0);
    }

    #[test]
    fn flat_form_skips_source_key() {
        let raw = r#"{ "source": "registry.example.com", "requests": "2.28.0" }"#;
        let decl = parse_declaration(raw).unwrap();
        assert_eq!(decl.source.as_deref(), Some("registry.example.com"));
        assert_eq!(decl.packages.len(), 1);
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        let raw = r#"{
            "packages": [
                { "name": "good", "version": "1.0.0" },
                { "name": "missing-version" },
                { "name": "also-good", "version": "2.0.0" }
            ]
        }"#;
        let decl = parse_declaration(raw).unwrap();
        assert_eq!(decl.packages.len(), 2);
        assert_eq!(decl.skipped_items, 1);
    }

    #[test]
    fn empty_name_is_skipped() {
        let raw = r#"{ "packages": [ { "name": "  ", "version": "1.0.0" } ] }"#;
        let decl = parse_declaration(raw).unwrap();
        assert!(decl.packages.is_empty());
        assert_eq!(decl.skipped_items, 1);
    }

    #[test]
    fn flat_form_skips_non_string_values() {
        let raw = r#"{ "good": "1.0.0", "bad": 42 }"#;
        let decl = parse_declaration(raw).unwrap();
        assert_eq!(decl.packages.len(), 1);
        assert_eq!(decl.skipped_items, 1);
    }

    #[test]
    fn invalid_json_is_document_error() {
        let err = parse_declaration("{ broken").unwrap_err();
        assert!(matches!(err, DependencyCheckerError::Document(_)));
    }

    #[test]
    fn non_object_document_rejected() {
        let err = parse_declaration("[\"a\"]").unwrap_err();
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn packages_must_be_array() {
        let raw = r#"{ "packages": "not-an-array" }"#;
        let err = parse_declaration(raw).unwrap_err();
        match err {
            DependencyCheckerError::Field { field, .. } => assert_eq!(field, "packages"),
            other => panic!("expected Field error, got: {other}"),
        }
    }

    #[test]
    fn empty_packages_array_is_valid() {
        let decl = parse_declaration(r#"{ "packages": [] }"#).unwrap();
        assert!(decl.packages.is_empty());
        assert_eq!(decl.skipped_items, 0);
    }

    #[test]
    fn oversized_document_rejected() {
        let raw = format!(r#"{{ "x": "{}" }}"#, "y".repeat(MAX_DECLARATION_SIZE));
        assert!(parse_declaration(&raw).is_err());
    }
}
