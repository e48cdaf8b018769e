//! 시맨틱 버전 범위 -- 연산자 기반 범위 매칭
//!
//! `semver` 크레이트를 사용하여 버전이 취약점 영향 범위에 포함되는지
//! 확인합니다. 범위는 비교 연산자(`<`, `<=`, `=`, `>=`, `>`) 제약의
//! 교집합이며, 피드 엔트리의 여러 범위 중 하나라도 매칭되면 영향받습니다.
//!
//! SemVer가 아닌 버전 문자열은 컴포넌트 패딩(`"1.2"` -> `"1.2.0"`)을
//! 시도하고, 그래도 파싱되지 않으면 문자열 비교로 fallback합니다.
//!
//! # 범위 문자열 형식
//!
//! ```text
//! "<1.2.3"            1.2.3 미만 전체
//! ">=1.0.0, <1.2.0"   1.0.0 이상 1.2.0 미만 (교집합)
//! "=2.0.1"            정확히 2.0.1
//! "2.0.1"             "=2.0.1"과 동일
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// 버전 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// 미만
    Lt,
    /// 이하
    Le,
    /// 일치
    Eq,
    /// 이상
    Ge,
    /// 초과
    Gt,
}

impl CmpOp {
    /// 연산자 기호를 반환합니다.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }
}

/// 단일 버전 제약 (연산자 + 기준 버전)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    /// 비교 연산자
    pub op: CmpOp,
    /// 기준 버전 문자열
    pub version: String,
}

impl VersionConstraint {
    /// 후보 버전이 이 제약을 만족하는지 확인합니다.
    pub fn matches(&self, candidate: &str) -> bool {
        let ord = compare_versions(candidate, &self.version);
        match self.op {
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ge => ord != Ordering::Less,
            CmpOp::Gt => ord == Ordering::Greater,
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (op, rest) = if let Some(rest) = s.strip_prefix("<=") {
            (CmpOp::Le, rest)
        } else if let Some(rest) = s.strip_prefix(">=") {
            (CmpOp::Ge, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (CmpOp::Lt, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (CmpOp::Gt, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (CmpOp::Eq, rest)
        } else {
            // 연산자 없는 버전은 일치 제약으로 해석
            (CmpOp::Eq, s)
        };

        let version = rest.trim();
        if version.is_empty() {
            return Err(ParseError::Field {
                field: "affected".to_owned(),
                reason: format!("constraint '{s}' has no version"),
            });
        }

        Ok(Self {
            op,
            version: version.to_owned(),
        })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)
    }
}

/// 버전 범위 -- 제약의 교집합
///
/// 모든 제약을 동시에 만족하는 버전만 범위에 포함됩니다.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    /// 제약 목록 (AND 결합)
    constraints: Vec<VersionConstraint>,
}

impl VersionRange {
    /// 제약 목록으로 범위를 생성합니다.
    pub fn new(constraints: Vec<VersionConstraint>) -> Self {
        Self { constraints }
    }

    /// 범위 문자열을 파싱합니다 (쉼표 구분, 교집합).
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        s.parse()
    }

    /// 제약 목록에 대한 참조를 반환합니다.
    pub fn constraints(&self) -> &[VersionConstraint] {
        &self.constraints
    }

    /// 주어진 버전이 범위에 포함되는지 확인합니다.
    pub fn contains(&self, version: &str) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }
}

impl FromStr for VersionRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseError::Field {
                field: "affected".to_owned(),
                reason: "empty version range".to_owned(),
            });
        }

        let constraints = s
            .split(',')
            .map(VersionConstraint::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { constraints })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl TryFrom<String> for VersionRange {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.to_string()
    }
}

/// 두 버전 문자열을 비교합니다.
///
/// 양쪽 모두 SemVer로 파싱되면 SemVer 순서를, 아니면 문자열 순서를
/// 사용합니다.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_loose(a), parse_loose(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        // fallback: 문자열 비교
        _ => a.trim().cmp(b.trim()),
    }
}

/// 버전 문자열을 관대하게 파싱합니다.
///
/// 선행 `v`를 제거하고, 컴포넌트가 부족하면 `.0`으로 패딩합니다
/// (`"1.2"` -> `"1.2.0"`, `"3"` -> `"3.0.0"`).
pub fn parse_loose(s: &str) -> Option<semver::Version> {
    let trimmed = s.trim().trim_start_matches('v');

    if let Ok(version) = semver::Version::parse(trimmed) {
        return Some(version);
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() < 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    {
        let padded = match parts.len() {
            1 => format!("{trimmed}.0.0"),
            2 => format!("{trimmed}.0"),
            _ => return None,
        };
        return semver::Version::parse(&padded).ok();
    }

    None
}

/// 두 버전 사이의 (major, minor) 격차를 계산합니다.
///
/// `latest`가 `current`보다 크지 않으면 `(0, 0)`을 반환합니다.
/// minor 격차는 major가 같을 때만 의미를 가지며, major가 다르면 0입니다.
/// 어느 쪽이든 파싱할 수 없으면 `None`을 반환합니다.
pub fn version_gap(current: &str, latest: &str) -> Option<(u64, u64)> {
    let cur = parse_loose(current)?;
    let lat = parse_loose(latest)?;

    if lat <= cur {
        return Some((0, 0));
    }

    let major = lat.major.saturating_sub(cur.major);
    let minor = if lat.major == cur.major {
        lat.minor.saturating_sub(cur.minor)
    } else {
        0
    };
    Some((major, minor))
}
