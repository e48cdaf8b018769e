//! 에러 타입 — 도메인별 에러 정의
//!
//! 에러 전파 정책은 세 단계로 구분됩니다.
//!
//! - 항목 레벨: 잘못된 의존성 엔트리 하나, 파싱 불가 로그 라인 하나는
//!   기록 후 건너뛰며 수집기 호출을 중단시키지 않습니다.
//! - 수집기 레벨: 문서 전체 파싱 실패([`ParseError`])나 피드 조회 실패
//!   ([`LookupError`])는 해당 수집기만 실패시키고 실행은 계속됩니다.
//! - 설정 레벨: [`ConfigError`]와 [`AggregateError`]만 실행 전체를
//!   실패시킵니다.

/// Chainwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ChainwatchError {
    /// 설정 관련 에러 — 실행 전체에 치명적
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력 문서 파싱 에러 — 해당 수집기 호출만 실패
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 취약점 피드 조회 에러 — 수집기 레벨 기능 저하로 기록
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// 집계 설정 에러 — 실행을 Failed 상태로 종료
    #[error("aggregate error: {0}")]
    Aggregate(#[from] AggregateError),

    /// 수집기 내부 에러
    #[error("collector error: {0}")]
    Collector(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 입력 문서 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 특정 필드가 잘못됨
    #[error("invalid field '{field}': {reason}")]
    Field { field: String, reason: String },

    /// 특정 라인이 잘못됨
    #[error("parse failed at line {line}: {reason}")]
    Line { line: usize, reason: String },

    /// 문서 전체가 잘못됨
    #[error("invalid document: {reason}")]
    Document { reason: String },

    /// 지원하지 않는 형식
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 입력 데이터 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

/// 취약점 피드 조회 에러
///
/// 피드는 주입된 읽기 전용 의존성이므로 조회 실패는 "취약점 데이터 없음"으로
/// 강등될 뿐 실행을 중단시키지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// 피드를 사용할 수 없음
    #[error("vulnerability feed unavailable: {0}")]
    Unavailable(String),

    /// 피드 조회 시간 초과
    #[error("vulnerability feed lookup timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// 집계 설정 에러
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// 유효하지 않은 threshold 규칙
    #[error("invalid threshold for severity {severity}: {reason}")]
    InvalidThreshold { severity: String, reason: String },
}
