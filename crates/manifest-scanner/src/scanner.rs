//! Manifest 스캔 로직 -- 신선도 / 레지스트리 / 취약점 검사
//!
//! [`ManifestScanner`]는 core의 [`Collector`] trait을 구현하여
//! 오케스트레이터가 다른 수집기와 동일한 방식으로 실행합니다.
//!
//! 탐지된 문제는 finding으로 표현되며, 에러는 manifest 자체를
//! 파싱할 수 없을 때만 반환됩니다. 취약점 피드 조회 실패는
//! 기능 저하(Partial)로 기록되고 나머지 검사 결과는 그대로 반환됩니다.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use chainwatch_core::collector::{Collector, CollectorOutput, ScanContext};
use chainwatch_core::feed::VulnFeed;
use chainwatch_core::metrics as m;
use chainwatch_core::types::{Finding, FindingSource, Severity};

use crate::config::ManifestScannerConfig;
use crate::error::ManifestScannerError;
use crate::manifest::{ContainerManifest, parse_manifest};

/// Manifest 스캐너
///
/// 하나의 manifest 문서에 대해 설정된 검사를 수행하고 finding을 방출합니다.
/// 불변 입력에 대한 순수 변환이며 내부 상태를 갖지 않습니다.
pub struct ManifestScanner {
    /// 스캐너 설정
    config: ManifestScannerConfig,
    /// 주입된 취약점 피드
    feed: Arc<dyn VulnFeed>,
}

impl ManifestScanner {
    /// 새 스캐너를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 실패 시 `ManifestScannerError::Config` 반환
    pub fn new(
        config: ManifestScannerConfig,
        feed: Arc<dyn VulnFeed>,
    ) -> Result<Self, ManifestScannerError> {
        config.validate()?;
        Ok(Self { config, feed })
    }

    /// manifest 문서를 스캔하여 finding을 방출합니다.
    ///
    /// 파싱에 실패하면 에러를 반환하며 finding은 일절 방출하지 않습니다.
    pub fn scan(
        &self,
        raw: &str,
        ctx: &ScanContext,
    ) -> Result<CollectorOutput, ManifestScannerError> {
        let manifest = parse_manifest(raw)?;

        let mut findings = Vec::new();
        let mut degraded = None;

        if self.config.check_freshness
            && let Some(finding) = self.check_freshness(&manifest, ctx)
        {
            findings.push(finding);
        }

        if self.config.check_registry {
            findings.extend(self.check_registries(&manifest, ctx));
        }

        if self.config.check_vulnerabilities {
            match self.check_vulnerabilities(&manifest, ctx) {
                Ok(vuln_findings) => findings.extend(vuln_findings),
                Err(e) => {
                    warn!(image = %manifest.image, error = %e, "vulnerability lookup failed, degrading");
                    degraded = Some(e.to_string());
                }
            }
        }

        counter!(m::MANIFEST_SCANS_TOTAL).increment(1);
        for finding in &findings {
            counter!(
                m::MANIFEST_FINDINGS_TOTAL,
                m::LABEL_SEVERITY => finding.severity.to_string().to_lowercase()
            )
            .increment(1);
        }

        debug!(
            image = %manifest.image,
            findings = findings.len(),
            "manifest scan completed"
        );

        Ok(CollectorOutput {
            findings,
            skipped_items: 0,
            degraded,
        })
    }

    /// base 이미지 신선도를 검사합니다.
    ///
    /// 기록된 연령이 최대 허용치를 넘거나, 고정 버전 허용 목록이 설정된
    /// 상태에서 버전이 목록에 없으면 finding을 방출합니다.
    fn check_freshness(&self, manifest: &ContainerManifest, ctx: &ScanContext) -> Option<Finding> {
        let base = &manifest.base_image;

        let over_age = base
            .age_days
            .is_some_and(|age| age > self.config.max_base_image_age_days);

        let off_pin = !self.config.pinned_base_versions.is_empty()
            && base.version.as_ref().is_some_and(|version| {
                !self.config.pinned_base_versions.contains(version)
            });

        if !over_age && !off_pin {
            return None;
        }

        let mut evidence = BTreeMap::new();
        evidence.insert("image".to_owned(), manifest.image.clone());
        evidence.insert("base_image".to_owned(), base.name.clone());
        if let Some(ref version) = base.version {
            evidence.insert("base_version".to_owned(), version.clone());
        }
        if let Some(age) = base.age_days {
            evidence.insert("age_days".to_owned(), age.to_string());
        }
        evidence.insert(
            "max_age_days".to_owned(),
            self.config.max_base_image_age_days.to_string(),
        );

        Some(
            Finding::new(
                FindingSource::Manifest,
                "outdated-base-image",
                Severity::High,
                ctx.scan_time,
                evidence,
                &["base_image", "base_version"],
            )
            .with_recommendation("Update to latest secure base image version"),
        )
    }

    /// 선언된 이미지 소스의 레지스트리 허가를 검사합니다.
    fn check_registries(&self, manifest: &ContainerManifest, ctx: &ScanContext) -> Vec<Finding> {
        let mut findings = Vec::new();

        for source in &manifest.image_sources {
            if self.is_trusted(source) {
                continue;
            }

            let registry = registry_of(source);
            let mut evidence = BTreeMap::new();
            evidence.insert("image".to_owned(), manifest.image.clone());
            evidence.insert("source".to_owned(), source.clone());
            evidence.insert("registry".to_owned(), registry.to_owned());

            findings.push(
                Finding::new(
                    FindingSource::Manifest,
                    "unauthorized-registry",
                    Severity::Medium,
                    ctx.scan_time,
                    evidence,
                    &["source"],
                )
                .with_recommendation("Use only approved container registries"),
            );
        }

        findings
    }

    /// 소스가 신뢰 목록에 포함되는지 확인합니다.
    ///
    /// 허용 목록 엔트리와 정확히 일치하거나, 엔트리를 레지스트리 접두어로
    /// 가지면 신뢰합니다 (`"gcr.io"`는 `"gcr.io/project/app"`을 허용).
    fn is_trusted(&self, source: &str) -> bool {
        self.config.trusted_registries.iter().any(|trusted| {
            source == trusted || source.starts_with(&format!("{trusted}/"))
        })
    }

    /// 취약점 피드에서 digest 및 base 이미지+버전을 조회합니다.
    fn check_vulnerabilities(
        &self,
        manifest: &ContainerManifest,
        ctx: &ScanContext,
    ) -> Result<Vec<Finding>, ManifestScannerError> {
        let mut findings = Vec::new();
        let mut seen = HashSet::new();

        // digest 조회 -- digest 엔트리는 버전 개념이 없음
        if let Some(ref digest) = manifest.digest {
            for entry in self.feed.lookup(digest)? {
                if seen.insert(entry.id.clone()) {
                    findings.push(self.vulnerability_finding(manifest, &entry, ctx));
                }
            }
        }

        // base 이미지 이름 + 버전 조회
        for entry in self.feed.lookup(&manifest.base_image.name)? {
            let matched = match &manifest.base_image.version {
                Some(version) => entry.matches_version(version),
                // 버전 정보가 없으면 범위 없는 엔트리만 매칭
                None => entry.affected.is_empty(),
            };
            if matched && seen.insert(entry.id.clone()) {
                findings.push(self.vulnerability_finding(manifest, &entry, ctx));
            }
        }

        Ok(findings)
    }

    /// 매칭된 피드 엔트리에서 finding을 생성합니다.
    fn vulnerability_finding(
        &self,
        manifest: &ContainerManifest,
        entry: &chainwatch_core::feed::FeedEntry,
        ctx: &ScanContext,
    ) -> Finding {
        let mut evidence = BTreeMap::new();
        evidence.insert("image".to_owned(), manifest.image.clone());
        evidence.insert("base_image".to_owned(), manifest.base_image_ref());
        evidence.insert("advisory".to_owned(), entry.id.clone());
        if let Some(ref digest) = manifest.digest {
            evidence.insert("digest".to_owned(), digest.clone());
        }
        if let Some(ref fixed) = entry.fixed_version {
            evidence.insert("fixed_version".to_owned(), fixed.clone());
        }

        // 피드가 심각도를 명시하지 않으면 Medium을 floor로 사용
        let severity = entry.severity.unwrap_or(Severity::Medium);

        let recommendation = match entry.fixed_version {
            Some(ref fixed) => format!("Upgrade base image to {fixed}"),
            None => format!("Investigate advisory {}", entry.id),
        };

        Finding::new(
            FindingSource::Manifest,
            "known-vulnerability",
            severity,
            ctx.scan_time,
            evidence,
            &["image", "advisory"],
        )
        .with_recommendation(recommendation)
    }
}

/// 소스 문자열에서 레지스트리 호스트 부분을 추출합니다.
fn registry_of(source: &str) -> &str {
    source.split('/').next().unwrap_or(source)
}

impl Collector for ManifestScanner {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn source(&self) -> FindingSource {
        FindingSource::Manifest
    }

    fn collect(
        &self,
        input: &str,
        ctx: &ScanContext,
    ) -> Result<CollectorOutput, chainwatch_core::error::ChainwatchError> {
        self.scan(input, ctx).map_err(Into::into)
    }
}
