// author: kodeholic (powered by Claude)
// 매직 넘버를 배제하고 시스템 전체의 성능과 한계를 제어하는 상수 모음입니다.
// 런타임 값은 Config::from_env()가 환경변수에서 읽어 덮어씁니다.

use std::str::FromStr;

/// 시그널링 서버 TCP 포트 (WS/HTTP 공용)
pub const DEFAULT_PORT: u16 = 3000;

/// 방 하나가 수용하는 최대 승인 대기(pending) 수 (플러딩 방어)
pub const MAX_PENDING_PER_ROOM: usize = 10;

/// IP 하나가 동시에 호스팅할 수 있는 방 개수
pub const MAX_ROOMS_PER_IP: usize = 5;

/// 유휴 연결 강제 종료 타임아웃 (5분)
pub const IDLE_TIMEOUT_MS: u64 = 300_000;

/// signal payload 직렬화 최대 크기 (bytes)
pub const MAX_PAYLOAD_SIZE: usize = 16_384;

/// joinRoom에서 이름 생략 시 기본값
pub const DEFAULT_PEER_NAME: &str = "Anonymous";

// ----------------------------------------------------------------------------
// [레이트 리밋 윈도우] — 고정 윈도우 카운터 설정값
// ----------------------------------------------------------------------------

/// IP당 연결 수락: 60초에 20회
pub const CONN_LIMIT_WINDOW_MS: u64 = 60_000;
pub const CONN_LIMIT_MAX: u32 = 20;

/// IP당 방 생성: 60초에 5회
pub const ROOM_LIMIT_WINDOW_MS: u64 = 60_000;
pub const ROOM_LIMIT_MAX: u32 = 5;

/// IP당 참여 시도: 60초에 30회
pub const JOIN_LIMIT_WINDOW_MS: u64 = 60_000;
pub const JOIN_LIMIT_MAX: u32 = 30;

/// 연결당 signal: 1초에 50회
pub const SIGNAL_LIMIT_WINDOW_MS: u64 = 1_000;
pub const SIGNAL_LIMIT_MAX: u32 = 50;

/// 만료된 레이트 리밋 버킷 수거 주기 (60초)
pub const SCAVENGE_INTERVAL_MS: u64 = 60_000;

/// 클라이언트에 내려주는 STUN 서버 목록 (단순 패스스루)
pub const STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

// ----------------------------------------------------------------------------
// [Config] 환경변수 기반 런타임 설정
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// PORT
    pub port: u16,
    /// MAX_PENDING_PER_ROOM
    pub max_pending_per_room: usize,
    /// MAX_ROOMS_PER_IP
    pub max_rooms_per_ip: usize,
    /// IDLE_TIMEOUT_MS
    pub idle_timeout_ms: u64,
    /// MAX_PAYLOAD_SIZE
    pub max_payload_size: usize,
    /// ADMIN_PASSWORD — 미설정 시 어드민 뷰 비활성화
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port:                 DEFAULT_PORT,
            max_pending_per_room: MAX_PENDING_PER_ROOM,
            max_rooms_per_ip:     MAX_ROOMS_PER_IP,
            idle_timeout_ms:      IDLE_TIMEOUT_MS,
            max_payload_size:     MAX_PAYLOAD_SIZE,
            admin_password:       None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port:                 env_parse("PORT", DEFAULT_PORT),
            max_pending_per_room: env_parse("MAX_PENDING_PER_ROOM", MAX_PENDING_PER_ROOM),
            max_rooms_per_ip:     env_parse("MAX_ROOMS_PER_IP", MAX_ROOMS_PER_IP),
            idle_timeout_ms:      env_parse("IDLE_TIMEOUT_MS", IDLE_TIMEOUT_MS),
            max_payload_size:     env_parse("MAX_PAYLOAD_SIZE", MAX_PAYLOAD_SIZE),
            admin_password:       std::env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// 환경변수 파싱 — 없거나 파싱 실패 시 기본값
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.max_pending_per_room, MAX_PENDING_PER_ROOM);
        assert_eq!(cfg.max_rooms_per_ip, MAX_ROOMS_PER_IP);
        assert_eq!(cfg.idle_timeout_ms, IDLE_TIMEOUT_MS);
        assert_eq!(cfg.max_payload_size, MAX_PAYLOAD_SIZE);
        assert!(cfg.admin_password.is_none(), "ADMIN_PASSWORD 기본값은 비활성이어야 합니다.");
    }
}
