//! 연결 빈도 기준선 -- 피어별 슬라이딩 윈도우 카운터
//!
//! 레코드 타임스탬프로 구동되는 단조 이벤트 카운트 구조입니다.
//! wall-clock 폴링을 사용하지 않으므로 재생/배치 로그도 실시간 모니터링과
//! 동일한 결과를 생성합니다.
//!
//! 윈도우는 `(ts - window, ts]` 반개구간입니다: 정확히 윈도우 길이만큼
//! 떨어진 과거 레코드는 더 이상 집계되지 않습니다.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};

/// 피어별 연결 빈도 추적기
///
/// 하나의 `monitor()` 패스 동안만 살아있는 내부 상태입니다.
/// 패스마다 새로 생성되므로 실행 간 상태 누수가 없습니다.
pub struct RateTracker {
    /// 윈도우 내 최대 허용 연결 수
    limit: usize,
    /// 슬라이딩 윈도우 길이
    window: Duration,
    /// 피어별 윈도우 내 타임스탬프
    peers: HashMap<IpAddr, VecDeque<DateTime<Utc>>>,
}

impl RateTracker {
    /// 새 추적기를 생성합니다.
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit: limit as usize,
            window: Duration::seconds(window_secs as i64),
            peers: HashMap::new(),
        }
    }

    /// 피어의 연결 한 건을 관측합니다.
    ///
    /// 이 연결을 포함한 윈도우 내 연결 수가 한도를 넘으면
    /// `Some(관측 수)`를 반환합니다.
    pub fn observe(&mut self, peer: IpAddr, ts: DateTime<Utc>) -> Option<usize> {
        let window = self.window;
        let deque = self.peers.entry(peer).or_default();

        let cutoff = ts - window;
        while let Some(front) = deque.front() {
            if *front <= cutoff {
                deque.pop_front();
            } else {
                break;
            }
        }

        deque.push_back(ts);

        let observed = deque.len();
        if observed > self.limit {
            Some(observed)
        } else {
            None
        }
    }
}
