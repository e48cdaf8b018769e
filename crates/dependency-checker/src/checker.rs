//! 의존성 검사 로직 -- 피드 매칭 / 호환성 / staleness
//!
//! [`DependencyChecker`]는 선언된 패키지 각각을 취약점 피드와 대조합니다.
//!
//! # 검사 순서 (패키지당)
//!
//! 1. 피드 조회 + 버전 범위 매칭 -- `known-vulnerability`
//! 2. 툴체인 호환성 -- `version-compatibility` (Low)
//! 3. staleness -- `security-update-available` (Low)
//!
//! 같은 패키지+버전에 여러 피드 엔트리가 매칭되면 최고 심각도 엔트리가
//! finding의 심각도를 결정하고, 매칭된 모든 어드바이저리 ID는 증거에
//! 보존됩니다. 피드 조회 실패는 기능 저하로 기록되며 나머지 패키지의
//! 다른 검사는 계속 수행됩니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use chainwatch_core::collector::{Collector, CollectorOutput, ScanContext};
use chainwatch_core::feed::{FeedEntry, VulnFeed};
use chainwatch_core::metrics as m;
use chainwatch_core::types::{Finding, FindingSource, Severity};
use chainwatch_core::version::{VersionRange, version_gap};

use crate::config::DependencyCheckerConfig;
use crate::declaration::{PackageEntry, parse_declaration};
use crate::error::DependencyCheckerError;

/// 의존성 검사기
///
/// 불변 입력에 대한 순수 변환이며, 주입된 피드 외의 외부 상태를
/// 참조하지 않습니다.
pub struct DependencyChecker {
    /// 검사기 설정
    config: DependencyCheckerConfig,
    /// 주입된 취약점 피드
    feed: Arc<dyn VulnFeed>,
}

impl DependencyChecker {
    /// 새 검사기를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 실패 시 `DependencyCheckerError::Config` 반환
    pub fn new(
        config: DependencyCheckerConfig,
        feed: Arc<dyn VulnFeed>,
    ) -> Result<Self, DependencyCheckerError> {
        config.validate()?;
        Ok(Self { config, feed })
    }

    /// 의존성 선언을 검사하여 finding을 방출합니다.
    pub fn check(
        &self,
        raw: &str,
        ctx: &ScanContext,
    ) -> Result<CollectorOutput, DependencyCheckerError> {
        let declaration = parse_declaration(raw)?;

        let mut findings = Vec::new();
        let mut skipped_items = declaration.skipped_items;
        let mut degraded: Option<String> = None;
        // 피드가 한 번 실패하면 나머지 패키지의 피드 호출은 생략
        let mut feed_available = true;

        for package in &declaration.packages {
            counter!(m::DEPENDENCY_PACKAGES_CHECKED_TOTAL).increment(1);

            if feed_available {
                match self.feed.lookup(&package.name) {
                    Ok(entries) => {
                        if let Some(finding) = self.check_vulnerability(package, &entries, ctx) {
                            findings.push(finding);
                        }
                        match self.check_staleness(package, &entries, ctx) {
                            Ok(Some(finding)) => findings.push(finding),
                            Ok(None) => {}
                            Err(e) => {
                                warn!(package = %package.name, error = %e, "latest version lookup failed, degrading");
                                degraded = Some(e.to_string());
                                feed_available = false;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(package = %package.name, error = %e, "feed lookup failed, degrading");
                        degraded = Some(e.to_string());
                        feed_available = false;
                    }
                }
            }

            match self.check_compatibility(package, ctx) {
                Ok(Some(finding)) => findings.push(finding),
                Ok(None) => {}
                Err(reason) => {
                    warn!(package = %package.name, reason = %reason, "unusable toolchain constraint, skipping entry check");
                    skipped_items += 1;
                }
            }
        }

        for finding in &findings {
            counter!(
                m::DEPENDENCY_FINDINGS_TOTAL,
                m::LABEL_SEVERITY => finding.severity.to_string().to_lowercase()
            )
            .increment(1);
        }
        if skipped_items > 0 {
            counter!(m::DEPENDENCY_ITEMS_SKIPPED_TOTAL).increment(skipped_items as u64);
        }

        debug!(
            packages = declaration.packages.len(),
            findings = findings.len(),
            skipped = skipped_items,
            "dependency check completed"
        );

        Ok(CollectorOutput {
            findings,
            skipped_items,
            degraded,
        })
    }

    /// 피드 엔트리와 버전 범위를 대조하여 취약점 finding을 생성합니다.
    ///
    /// 여러 엔트리가 매칭되면 최고 심각도 엔트리가 승리하며,
    /// 모든 매칭 ID는 `advisories` 증거로 보존됩니다.
    fn check_vulnerability(
        &self,
        package: &PackageEntry,
        entries: &[FeedEntry],
        ctx: &ScanContext,
    ) -> Option<Finding> {
        let matched: Vec<&FeedEntry> = entries
            .iter()
            .filter(|entry| entry.matches_version(&package.version))
            .collect();

        if matched.is_empty() {
            return None;
        }

        // 최고 심각도 엔트리 선택 (미지정 심각도는 Medium floor)
        let winner = matched
            .iter()
            .max_by_key(|entry| entry.severity.unwrap_or(Severity::Medium))?;

        let advisories: Vec<&str> = matched.iter().map(|entry| entry.id.as_str()).collect();

        let mut evidence = BTreeMap::new();
        evidence.insert("package".to_owned(), package.name.clone());
        evidence.insert("version".to_owned(), package.version.clone());
        evidence.insert("advisories".to_owned(), advisories.join(","));
        evidence.insert("severity_source".to_owned(), winner.id.clone());
        if let Some(ref fixed) = winner.fixed_version {
            evidence.insert("fixed_version".to_owned(), fixed.clone());
        }

        let severity = winner.severity.unwrap_or(Severity::Medium);
        let recommendation = match winner.fixed_version {
            Some(ref fixed) => format!("Upgrade to version {fixed}"),
            None => format!("No fixed version known for {}, consider replacing it", package.name),
        };

        Some(
            Finding::new(
                FindingSource::Dependency,
                "known-vulnerability",
                severity,
                ctx.scan_time,
                evidence,
                &["package", "version"],
            )
            .with_recommendation(recommendation),
        )
    }

    /// 선언된 툴체인 제약이 설정된 툴체인 버전을 만족하는지 검사합니다.
    ///
    /// 제약 문자열 자체가 파싱 불가능하면 사유를 `Err`로 반환합니다
    /// (호출자가 건너뛴 항목으로 집계).
    fn check_compatibility(
        &self,
        package: &PackageEntry,
        ctx: &ScanContext,
    ) -> Result<Option<Finding>, String> {
        if self.config.toolchain_version.is_empty() {
            return Ok(None);
        }
        let Some(ref required) = package.requires_toolchain else {
            return Ok(None);
        };

        let range = VersionRange::parse(required).map_err(|e| e.to_string())?;
        if range.contains(&self.config.toolchain_version) {
            return Ok(None);
        }

        let mut evidence = BTreeMap::new();
        evidence.insert("package".to_owned(), package.name.clone());
        evidence.insert("version".to_owned(), package.version.clone());
        evidence.insert("required_toolchain".to_owned(), required.clone());
        evidence.insert(
            "toolchain".to_owned(),
            self.config.toolchain_version.clone(),
        );

        Ok(Some(
            Finding::new(
                FindingSource::Dependency,
                "version-compatibility",
                Severity::Low,
                ctx.scan_time,
                evidence,
                &["package", "required_toolchain"],
            )
            .with_recommendation(format!(
                "Use a toolchain matching {required} or pin a compatible release of {}",
                package.name,
            )),
        ))
    }

    /// 더 새로운 비취약 버전이 있고 격차가 기준을 넘으면
    /// `security-update-available` finding을 생성합니다.
    fn check_staleness(
        &self,
        package: &PackageEntry,
        entries: &[FeedEntry],
        ctx: &ScanContext,
    ) -> Result<Option<Finding>, DependencyCheckerError> {
        let Some(latest) = self.feed.latest_version(&package.name)? else {
            return Ok(None);
        };

        // 최신 버전 자체가 취약하면 업데이트 권고 대상이 아님
        if entries.iter().any(|entry| entry.matches_version(&latest)) {
            return Ok(None);
        }

        let Some((major_gap, minor_gap)) = version_gap(&package.version, &latest) else {
            return Ok(None);
        };

        let stale =
            major_gap >= self.config.max_major_lag || minor_gap >= self.config.max_minor_lag;
        if !stale {
            return Ok(None);
        }

        let mut evidence = BTreeMap::new();
        evidence.insert("package".to_owned(), package.name.clone());
        evidence.insert("version".to_owned(), package.version.clone());
        evidence.insert("latest_version".to_owned(), latest.clone());
        evidence.insert("major_gap".to_owned(), major_gap.to_string());
        evidence.insert("minor_gap".to_owned(), minor_gap.to_string());

        Ok(Some(
            Finding::new(
                FindingSource::Dependency,
                "security-update-available",
                Severity::Low,
                ctx.scan_time,
                evidence,
                &["package", "latest_version"],
            )
            .with_recommendation(format!("Upgrade to version {latest}")),
        ))
    }
}

impl Collector for DependencyChecker {
    fn name(&self) -> &'static str {
        "dependency"
    }

    fn source(&self) -> FindingSource {
        FindingSource::Dependency
    }

    fn collect(
        &self,
        input: &str,
        ctx: &ScanContext,
    ) -> Result<CollectorOutput, chainwatch_core::error::ChainwatchError> {
        self.check(input, ctx).map_err(Into::into)
    }
}
