//! 컨테이너 manifest 문서 모델 및 파싱
//!
//! JSON manifest 문서를 [`ContainerManifest`]로 파싱합니다.
//! 필수 필드가 빠지거나 형식이 잘못되면 문제가 된 필드명을 담은
//! 에러를 반환하며, 파싱에 실패한 manifest에 대해서는 finding을
//! 일절 방출하지 않습니다.
//!
//! # 문서 형식
//!
//! ```json
//! {
//!   "image": "example-app:1.4.2",
//!   "digest": "sha256:abcd...",
//!   "baseImage": { "name": "alpine", "version": "3.12", "ageDays": 240 },
//!   "imageSources": ["registry.example.com/app"]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ManifestScannerError;

/// manifest 문서 최대 크기 (1 MB)
const MAX_MANIFEST_SIZE: usize = 1024 * 1024;

/// 파싱된 컨테이너 manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerManifest {
    /// 이미지 참조 (예: "example-app:1.4.2")
    pub image: String,
    /// 이미지 digest (있을 경우)
    #[serde(default)]
    pub digest: Option<String>,
    /// base 이미지 정보
    pub base_image: BaseImage,
    /// 선언된 이미지 소스/레지스트리 목록
    #[serde(default)]
    pub image_sources: Vec<String>,
}

/// base 이미지 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseImage {
    /// base 이미지 이름 (예: "alpine")
    pub name: String,
    /// base 이미지 버전 (있을 경우)
    #[serde(default)]
    pub version: Option<String>,
    /// 기록된 이미지 연령 (일, 있을 경우)
    #[serde(default)]
    pub age_days: Option<u32>,
}

/// 원시 JSON 문서를 manifest로 파싱합니다.
///
/// serde 역직렬화 전에 필수 필드를 직접 확인하여 문제가 된 필드명을
/// 에러에 담습니다.
pub fn parse_manifest(raw: &str) -> Result<ContainerManifest, ManifestScannerError> {
    if raw.len() > MAX_MANIFEST_SIZE {
        return Err(ManifestScannerError::Document(format!(
            "manifest too large: {} bytes (max: {})",
            raw.len(),
            MAX_MANIFEST_SIZE,
        )));
    }

    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ManifestScannerError::Document(format!("invalid JSON: {e}")))?;

    let obj = value
        .as_object()
        .ok_or_else(|| ManifestScannerError::Document("expected JSON object".to_owned()))?;

    // 필수 필드 사전 검증
    match obj.get("image") {
        Some(v) if v.is_string() => {}
        Some(_) => {
            return Err(ManifestScannerError::Field {
                field: "image".to_owned(),
                reason: "expected string".to_owned(),
            });
        }
        None => {
            return Err(ManifestScannerError::Field {
                field: "image".to_owned(),
                reason: "missing required field".to_owned(),
            });
        }
    }

    match obj.get("baseImage") {
        Some(base) => {
            let base_obj = base.as_object().ok_or_else(|| ManifestScannerError::Field {
                field: "baseImage".to_owned(),
                reason: "expected object".to_owned(),
            })?;
            match base_obj.get("name") {
                Some(v) if v.is_string() => {}
                _ => {
                    return Err(ManifestScannerError::Field {
                        field: "baseImage.name".to_owned(),
                        reason: "missing or non-string".to_owned(),
                    });
                }
            }
        }
        None => {
            return Err(ManifestScannerError::Field {
                field: "baseImage".to_owned(),
                reason: "missing required field".to_owned(),
            });
        }
    }

    serde_json::from_value(value)
        .map_err(|e| ManifestScannerError::Document(format!("invalid manifest: {e}")))
}

impl ContainerManifest {
    /// base 이미지의 전체 참조 문자열을 반환합니다 (예: "alpine:3.12").
    pub fn base_image_ref(&self) -> String {
        match &self.base_image.version {
            Some(version) => format!("{}:{}", self.base_image.name, version),
            None => self.base_image.name.clone(),
        }
    }
}
