//! 스캔 오케스트레이션 -- 수집기 fan-out/fan-in과 실행 생명주기
//!
//! [`ScanOrchestrator`]는 작업을 스케줄하는 유일한 컴포넌트입니다.
//! 수집기들은 불변 입력에 대한 순수 함수이므로 `spawn_blocking` 태스크로
//! 병렬 실행되며, 서로의 출력을 관찰할 수 없습니다. 모든 수집기가
//! 완료(성공 또는 에러)된 뒤에만 집계가 시작됩니다.
//!
//! # 상태 기계
//!
//! ```text
//! Idle --> Running{수집기 병렬 실행} --> Aggregating --> Done
//!                                                    \-> Failed
//! ```
//!
//! # 결정론
//!
//! finding 병합은 수집기 완료 순서가 아니라 고정 순서
//! (manifest, dependency, network)로 수행됩니다. 타임아웃으로 취소된
//! 수집기의 부분 출력은 병합하지 않고 버립니다.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chainwatch_aggregator::{Report, aggregate, generate};
use chainwatch_core::collector::{Collector, CollectorOutput, ScanContext};
use chainwatch_core::config::ChainwatchConfig;
use chainwatch_core::error::ChainwatchError;
use chainwatch_core::feed::VulnFeed;
use chainwatch_core::metrics as m;
use chainwatch_core::types::{CollectorOutcome, Finding, RunMetadata, SeverityCounts};
use chainwatch_dependency_checker::{DependencyChecker, DependencyCheckerConfig};
use chainwatch_manifest_scanner::{ManifestScanner, ManifestScannerConfig};
use chainwatch_network_monitor::{NetworkMonitor, NetworkMonitorConfig};

/// 수집기 슬롯 이름 (병합 순서 고정)
const COLLECTOR_NAMES: [&str; 3] = ["manifest", "dependency", "network"];

/// 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// 시작 전
    Idle,
    /// 수집기 실행 중
    Running,
    /// 수집 완료, 집계 중
    Aggregating,
    /// 정상 종료
    Done,
    /// 설정/집계 에러로 종료 (best-effort 리포트 생성됨)
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Aggregating => write!(f, "aggregating"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// 한 실행의 원시 입력 문서
///
/// 바이트 획득(파일 읽기, 수집 등)은 외부 협력자의 책임이며,
/// 형식 파싱은 각 수집기의 책임입니다. `None`인 입력의 수집기는
/// 실행되지 않고 Skipped로 기록됩니다.
#[derive(Debug, Clone, Default)]
pub struct ScanInputs {
    /// 컨테이너 manifest 문서 (JSON)
    pub manifest: Option<String>,
    /// 의존성 선언 문서 (JSON)
    pub dependencies: Option<String>,
    /// 연결 로그 (라인 단위)
    pub connection_log: Option<String>,
}

/// 실행할 준비가 된 수집기 슬롯
struct PreparedCollector {
    /// 수집기 이름
    name: &'static str,
    /// 수집기와 입력 (Skipped 슬롯은 None)
    work: Option<(Box<dyn Collector>, String)>,
}

/// 스캔 오케스트레이터
///
/// 실행 간 상태를 보유하지 않습니다. 각 `run()` 호출이 독립적인 실행이며,
/// 이전 실행의 finding과 alert는 새 실행 시작 시점에 폐기됩니다
/// (실행 간 지속성 없음).
pub struct ScanOrchestrator {
    /// 검증된 설정
    config: ChainwatchConfig,
    /// 주입된 취약점 피드
    feed: Arc<dyn VulnFeed>,
}

impl ScanOrchestrator {
    /// 새 오케스트레이터를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 실패 시 `ChainwatchError::Config` 반환
    pub fn new(
        config: ChainwatchConfig,
        feed: Arc<dyn VulnFeed>,
    ) -> Result<Self, ChainwatchError> {
        config.validate()?;
        Ok(Self { config, feed })
    }

    /// 설정에 대한 참조를 반환합니다.
    pub fn config(&self) -> &ChainwatchConfig {
        &self.config
    }

    /// 한 번의 스캔 실행을 수행하고 리포트를 반환합니다.
    ///
    /// 이 메서드는 실패하지 않습니다: 수집기 에러는 수집기별 기록으로,
    /// 치명적 에러(수집기 설정, 집계 설정)는 `Failed` 상태의 best-effort
    /// 리포트로 표현됩니다.
    pub async fn run(&self, inputs: ScanInputs) -> Report {
        let started_at = SystemTime::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let ctx = ScanContext::new(started_at);

        let mut state = RunState::Idle;
        info!(run_id = %run_id, state = %state, "scan run created");

        // 수집기 준비 -- 모듈 설정이 유효하지 않으면 실행 전체 실패
        let mut prepared = match self.prepare_collectors(&inputs) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "collector configuration invalid, failing run");
                return self.failed_report(run_id, started_at, e.to_string());
            }
        };

        state = RunState::Running;
        info!(run_id = %run_id, state = %state, "starting collectors");

        // fan-out: 각 수집기를 독립 blocking 태스크로 실행
        let cancel = CancellationToken::new();
        let mut join_set: JoinSet<(usize, Result<CollectorOutput, ChainwatchError>)> =
            JoinSet::new();
        let mut started = [false; 3];

        for (slot, collector_slot) in prepared.iter_mut().enumerate() {
            let Some((collector, input)) = collector_slot.work.take() else {
                debug!(collector = collector_slot.name, "collector skipped (disabled or no input)");
                continue;
            };
            started[slot] = true;

            let token = cancel.clone();
            join_set.spawn_blocking(move || {
                if token.is_cancelled() {
                    return (
                        slot,
                        Err(ChainwatchError::Collector("cancelled before start".to_owned())),
                    );
                }
                (slot, collector.collect(&input, &ctx))
            });
        }

        // fan-in: 모든 수집기의 완료를 기다림 (타임아웃 시 취소)
        let mut results: [Option<Result<CollectorOutput, ChainwatchError>>; 3] =
            [None, None, None];
        let deadline = (self.config.run.timeout_secs > 0).then(|| {
            tokio::time::Instant::now() + Duration::from_secs(self.config.run.timeout_secs)
        });
        let mut timed_out = false;

        loop {
            let joined = match deadline {
                Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            run_id = %run_id,
                            timeout_secs = self.config.run.timeout_secs,
                            "run timeout exceeded, cancelling in-flight collectors"
                        );
                        cancel.cancel();
                        join_set.abort_all();
                        timed_out = true;
                        break;
                    }
                },
                None => join_set.join_next().await,
            };

            match joined {
                Some(Ok((slot, result))) => results[slot] = Some(result),
                Some(Err(e)) => {
                    // 태스크 panic/abort -- 해당 슬롯은 결과 없음으로 남김
                    error!(run_id = %run_id, error = %e, "collector task join failed");
                }
                None => break,
            }
        }

        // 병합: 완료 순서가 아니라 고정 슬롯 순서로
        let mut findings: Vec<Finding> = Vec::new();
        let mut outcomes = Vec::with_capacity(COLLECTOR_NAMES.len());

        for (slot, collector_slot) in prepared.iter().enumerate() {
            let name = collector_slot.name;

            if !started[slot] {
                outcomes.push(CollectorOutcome::skipped(name));
                continue;
            }

            match results[slot].take() {
                Some(Ok(output)) => {
                    if let Some(ref reason) = output.degraded {
                        warn!(collector = name, reason = %reason, "collector completed degraded");
                    }
                    outcomes.push(CollectorOutcome {
                        name: name.to_owned(),
                        status: output.status(),
                        findings: output.findings.len(),
                        skipped_items: output.skipped_items,
                        error: output.degraded.clone(),
                    });
                    findings.extend(output.findings);
                }
                Some(Err(e)) => {
                    warn!(collector = name, error = %e, "collector failed");
                    outcomes.push(CollectorOutcome::failed(name, e.to_string()));
                }
                None => {
                    // 타임아웃 취소 -- 부분 출력은 결정론을 위해 폐기
                    let reason = if timed_out {
                        "cancelled: run timeout exceeded"
                    } else {
                        "collector task aborted"
                    };
                    outcomes.push(CollectorOutcome::failed(name, reason));
                }
            }
        }

        state = RunState::Aggregating;
        info!(
            run_id = %run_id,
            state = %state,
            findings = findings.len(),
            "all collectors completed, aggregating"
        );

        let (alerts, failure) = match aggregate(&findings, &self.config.thresholds) {
            Ok(alerts) => (alerts, None),
            Err(e) => {
                error!(run_id = %run_id, error = %e, "aggregation configuration invalid");
                (Vec::new(), Some(e.to_string()))
            }
        };

        state = if failure.is_some() {
            RunState::Failed
        } else {
            RunState::Done
        };

        let finished_at = SystemTime::now();
        let metadata = RunMetadata {
            run_id: run_id.clone(),
            started_at,
            finished_at,
            collectors: outcomes,
            severity_counts: SeverityCounts::default(), // generate()에서 계산
            failure,
        };
        let report = generate(findings, alerts, metadata);

        counter!(
            m::ENGINE_RUNS_TOTAL,
            m::LABEL_RESULT => state.to_string()
        )
        .increment(1);
        if let Ok(elapsed) = finished_at.duration_since(started_at) {
            histogram!(m::ENGINE_RUN_DURATION_SECONDS).record(elapsed.as_secs_f64());
        }

        info!(
            run_id = %run_id,
            state = %state,
            findings = report.finding_count(),
            alerts = report.alert_count(),
            "scan run finished"
        );

        report
    }

    /// 설정과 입력 유무에 따라 세 수집기 슬롯을 준비합니다.
    fn prepare_collectors(
        &self,
        inputs: &ScanInputs,
    ) -> Result<Vec<PreparedCollector>, ChainwatchError> {
        let mut prepared = Vec::with_capacity(COLLECTOR_NAMES.len());

        let manifest_work = if self.config.manifest.enabled {
            match inputs.manifest {
                Some(ref input) => {
                    let scanner = ManifestScanner::new(
                        ManifestScannerConfig::from_core(&self.config.manifest),
                        Arc::clone(&self.feed),
                    )?;
                    Some((Box::new(scanner) as Box<dyn Collector>, input.clone()))
                }
                None => None,
            }
        } else {
            None
        };
        prepared.push(PreparedCollector {
            name: COLLECTOR_NAMES[0],
            work: manifest_work,
        });

        let dependency_work = if self.config.dependency.enabled {
            match inputs.dependencies {
                Some(ref input) => {
                    let checker = DependencyChecker::new(
                        DependencyCheckerConfig::from_core(&self.config.dependency),
                        Arc::clone(&self.feed),
                    )?;
                    Some((Box::new(checker) as Box<dyn Collector>, input.clone()))
                }
                None => None,
            }
        } else {
            None
        };
        prepared.push(PreparedCollector {
            name: COLLECTOR_NAMES[1],
            work: dependency_work,
        });

        let network_work = if self.config.network.enabled {
            match inputs.connection_log {
                Some(ref input) => {
                    let monitor =
                        NetworkMonitor::new(NetworkMonitorConfig::from_core(&self.config.network))?;
                    Some((Box::new(monitor) as Box<dyn Collector>, input.clone()))
                }
                None => None,
            }
        } else {
            None
        };
        prepared.push(PreparedCollector {
            name: COLLECTOR_NAMES[2],
            work: network_work,
        });

        Ok(prepared)
    }

    /// 수집이 시작되지 못한 실행의 best-effort 리포트를 생성합니다.
    fn failed_report(&self, run_id: String, started_at: SystemTime, reason: String) -> Report {
        let outcomes = COLLECTOR_NAMES
            .iter()
            .map(|name| CollectorOutcome::skipped(*name))
            .collect();

        counter!(
            m::ENGINE_RUNS_TOTAL,
            m::LABEL_RESULT => RunState::Failed.to_string()
        )
        .increment(1);

        generate(
            Vec::new(),
            Vec::new(),
            RunMetadata {
                run_id,
                started_at,
                finished_at: SystemTime::now(),
                collectors: outcomes,
                severity_counts: SeverityCounts::default(),
                failure: Some(reason),
            },
        )
    }
}

/// 한 번의 스캔 실행을 수행합니다.
///
/// [`ScanOrchestrator`]를 만들고 즉시 실행하는 편의 함수입니다.
///
/// # Errors
///
/// 최상위 설정이 유효하지 않으면 `ChainwatchError::Config`를 반환합니다.
/// 그 외의 모든 실패는 리포트의 실행 메타데이터에 기록됩니다.
pub async fn run(
    config: ChainwatchConfig,
    inputs: ScanInputs,
    feed: Arc<dyn VulnFeed>,
) -> Result<Report, ChainwatchError> {
    let orchestrator = ScanOrchestrator::new(config, feed)?;
    Ok(orchestrator.run(inputs).await)
}
