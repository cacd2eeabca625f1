// author: kodeholic (powered by Claude)
// 만료 레이트 리밋 버킷 수거 태스크
//
// 주기마다 네 리미터 인스턴스의 만료 버킷을 제거한다.
// RPC 경로와 같은 락 규율(인스턴스별 Mutex)을 그대로 쓴다.

use std::sync::Arc;
use tracing::info;

use crate::config;
use crate::limiter::Limiters;

pub async fn run_limiter_scavenger(limiters: Arc<Limiters>) {
    let interval  = tokio::time::Duration::from_millis(config::SCAVENGE_INTERVAL_MS);
    let mut timer = tokio::time::interval(interval);
    timer.tick().await; // 첫 틱 skip (startup 시 즉시 실행 방지)

    info!("[scavenger] Started (interval={}ms)", config::SCAVENGE_INTERVAL_MS);

    loop {
        timer.tick().await;

        let removed = limiters.scavenge();
        if removed > 0 {
            info!("[scavenger] Cleaned {} expired bucket(s)", removed);
        }
    }
}
