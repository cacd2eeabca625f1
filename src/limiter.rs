// author: kodeholic (powered by Claude)
//
// 고정 윈도우 레이트 리미터
//
// 키는 불투명 문자열(IP 또는 conn_id). 버킷은 첫 히트에 생성되고
// 윈도우 경과 후 다음 시도에서 lazy 리셋된다. 만료 버킷은 주기 수거
// 태스크(reaper)가 cleanup()으로 제거한다.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config;

struct Bucket {
    count:    u32,
    reset_at: Instant,
}

pub struct RateLimiter {
    window:       Duration,
    max_requests: u32,
    buckets:      Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window:       Duration::from_millis(window_ms),
            max_requests,
            buckets:      Mutex::new(HashMap::new()),
        }
    }

    /// 요청 1건 수락 여부. 수락 시 카운트가 증가한다.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        match buckets.get_mut(key) {
            Some(bucket) if now <= bucket.reset_at => {
                if bucket.count >= self.max_requests {
                    return false;
                }
                bucket.count += 1;
                true
            }
            // 버킷 없음 또는 윈도우 경과 — 새 윈도우 시작
            _ => {
                buckets.insert(key.to_string(), Bucket {
                    count:    1,
                    reset_at: now + self.window,
                });
                true
            }
        }
    }

    /// 현재 윈도우에서 남은 허용량
    pub fn remaining(&self, key: &str) -> u32 {
        let now = Instant::now();
        let buckets = self.buckets.lock().unwrap();
        match buckets.get(key) {
            Some(bucket) if now <= bucket.reset_at => {
                self.max_requests.saturating_sub(bucket.count)
            }
            _ => self.max_requests,
        }
    }

    /// 만료 버킷 일괄 제거 — 제거한 개수 반환
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.reset_at >= now);
        before - buckets.len()
    }
}

// ----------------------------------------------------------------------------
// [Limiters] 세션 계층이 쓰는 사전 구성 인스턴스 묶음
// ----------------------------------------------------------------------------

pub struct Limiters {
    /// IP당 연결 수락 (핸드셰이크 전에 적용)
    pub connect:     RateLimiter,
    /// IP당 방 생성
    pub room_create: RateLimiter,
    /// IP당 참여 시도
    pub join:        RateLimiter,
    /// 연결당 signal
    pub signal:      RateLimiter,
}

impl Limiters {
    pub fn new() -> Self {
        Self {
            connect:     RateLimiter::new(config::CONN_LIMIT_WINDOW_MS, config::CONN_LIMIT_MAX),
            room_create: RateLimiter::new(config::ROOM_LIMIT_WINDOW_MS, config::ROOM_LIMIT_MAX),
            join:        RateLimiter::new(config::JOIN_LIMIT_WINDOW_MS, config::JOIN_LIMIT_MAX),
            signal:      RateLimiter::new(config::SIGNAL_LIMIT_WINDOW_MS, config::SIGNAL_LIMIT_MAX),
        }
    }

    /// 네 인스턴스의 만료 버킷을 모두 수거 — 총 제거 개수 반환
    pub fn scavenge(&self) -> usize {
        self.connect.cleanup()
            + self.room_create.cleanup()
            + self.join.cleanup()
            + self.signal.cleanup()
    }
}

impl Default for Limiters {
    fn default() -> Self {
        Self::new()
    }
}
