//! 포트 스캔 휴리스틱 -- (출발지, 목적지) 쌍별 고유 포트 추적
//!
//! 짧은 간격 내에 같은 호스트의 서로 다른 포트로 반복 연결을 시도하는
//! 패턴(포트 스캔 시그니처)을 탐지합니다. 윈도우는 레코드 타임스탬프로
//! 평가되며, 같은 포트로의 반복 연결은 새 신호로 치지 않습니다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};

/// 포트 스캔 추적기
///
/// `(src, dst)` 쌍마다 윈도우 내 `(타임스탬프, 포트)` 이력을 유지합니다.
/// [`RateTracker`](crate::baseline::RateTracker)처럼 패스마다 새로 생성됩니다.
pub struct PortScanTracker {
    /// 판정에 필요한 최소 고유 포트 수
    min_ports: usize,
    /// 슬라이딩 윈도우 길이
    window: Duration,
    /// (출발지, 목적지)별 윈도우 내 연결 이력
    pairs: HashMap<(IpAddr, IpAddr), VecDeque<(DateTime<Utc>, u16)>>,
}

impl PortScanTracker {
    /// 새 추적기를 생성합니다.
    pub fn new(min_ports: u32, window_secs: u64) -> Self {
        Self {
            min_ports: min_ports as usize,
            window: Duration::seconds(window_secs as i64),
            pairs: HashMap::new(),
        }
    }

    /// 연결 시도 한 건을 관측합니다.
    ///
    /// 이 시도로 윈도우 내 고유 목적지 포트 수가 기준에 도달하거나
    /// (이미 도달한 상태에서) 새 고유 포트가 추가되면
    /// `Some(고유 포트 수)`를 반환합니다. 같은 포트로의 반복 시도는
    /// finding을 중복 생성하지 않습니다.
    pub fn observe(
        &mut self,
        src: IpAddr,
        dst: IpAddr,
        port: u16,
        ts: DateTime<Utc>,
    ) -> Option<usize> {
        let window = self.window;
        let deque = self.pairs.entry((src, dst)).or_default();

        let cutoff = ts - window;
        while let Some((front_ts, _)) = deque.front() {
            if *front_ts <= cutoff {
                deque.pop_front();
            } else {
                break;
            }
        }

        let seen: HashSet<u16> = deque.iter().map(|(_, p)| *p).collect();
        let is_new_port = !seen.contains(&port);

        deque.push_back((ts, port));

        let distinct = seen.len() + usize::from(is_new_port);
        if is_new_port && distinct >= self.min_ports {
            Some(distinct)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn src() -> IpAddr {
        "198.51.100.77".parse().unwrap()
    }

    fn dst() -> IpAddr {
        "10.0.0.8".parse().unwrap()
    }

    #[test]
    fn fires_at_min_distinct_ports() {
        let mut tracker = PortScanTracker::new(3, 10);
        assert_eq!(tracker.observe(src(), dst(), 20, ts(0)), None);
        assert_eq!(tracker.observe(src(), dst(), 21, ts(1)), None);
        assert_eq!(tracker.observe(src(), dst(), 22, ts(2)), Some(3));
    }

    #[test]
    fn repeated_port_does_not_fire() {
        let mut tracker = PortScanTracker::new(3, 10);
        tracker.observe(src(), dst(), 20, ts(0));
        tracker.observe(src(), dst(), 21, ts(1));
        tracker.observe(src(), dst(), 22, ts(2));
        // 같은 포트 재시도: 새 고유 포트가 아니므로 조용함
        assert_eq!(tracker.observe(src(), dst(), 22, ts(3)), None);
        // 새 고유 포트는 다시 신호
        assert_eq!(tracker.observe(src(), dst(), 23, ts(4)), Some(4));
    }

    #[test]
    fn window_eviction_resets_count() {
        let mut tracker = PortScanTracker::new(3, 10);
        tracker.observe(src(), dst(), 20, ts(0));
        tracker.observe(src(), dst(), 21, ts(1));
        // 20초 뒤: 이전 이력은 윈도우 밖
        assert_eq!(tracker.observe(src(), dst(), 22, ts(20)), None);
        assert_eq!(tracker.observe(src(), dst(), 23, ts(21)), None);
        assert_eq!(tracker.observe(src(), dst(), 24, ts(22)), Some(3));
    }

    #[test]
    fn pairs_tracked_independently() {
        let other_dst: IpAddr = "10.0.0.9".parse().unwrap();
        let mut tracker = PortScanTracker::new(2, 10);
        tracker.observe(src(), dst(), 20, ts(0));
        // 다른 목적지 호스트는 별도 집계
        assert_eq!(tracker.observe(src(), other_dst, 21, ts(1)), None);
        assert_eq!(tracker.observe(src(), dst(), 22, ts(2)), Some(2));
    }

    #[test]
    fn slow_scan_outside_window_not_flagged() {
        let mut tracker = PortScanTracker::new(3, 10);
        assert_eq!(tracker.observe(src(), dst(), 20, ts(0)), None);
        assert_eq!(tracker.observe(src(), dst(), 21, ts(15)), None);
        assert_eq!(tracker.observe(src(), dst(), 22, ts(30)), None);
    }
}
