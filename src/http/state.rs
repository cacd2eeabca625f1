// author: kodeholic (powered by Claude)
// HttpState — HTTP 핸들러 공유 상태

use std::sync::Arc;

use crate::config::Config;
use crate::registry::RoomRegistry;
use crate::utils::now_millis;

#[derive(Clone)]
pub struct HttpState {
    pub registry: Arc<RoomRegistry>,
    pub config:   Arc<Config>,
    /// 서버 프로세스 시작 시각 (Unix millis) — uptime 계산용
    pub start_time_ms: u64,
}

impl HttpState {
    pub fn new(registry: Arc<RoomRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config, start_time_ms: now_millis() }
    }
}
