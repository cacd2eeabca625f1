// author: kodeholic (powered by Claude)
//
// 세션 코디네이터 — 연결 하나의 생명주기 전체를 담당한다.
//
// 수락:   IP당 연결 리미터를 핸드셰이크 전에 적용 (거절 = HTTP 429)
// 수신:   유휴 타임아웃을 걸고 패킷을 받아 RPC 래퍼로 dispatch
// 래퍼:   리미터 → 코드 정규화/검증 → 레지스트리 위임 → STUN 목록 부착
// 종료:   소켓 종료/에러/유휴 만료 어느 경로든 disconnect 정리 1회 실행

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};

use crate::code;
use crate::config::{self, Config};
use crate::error::{BrokerError, BrokerResult, RateScope};
use crate::limiter::Limiters;
use crate::protocol::{
    message::{
        ApprovePeerPayload, ErrorPayload, AckPayload, GatewayPacket, IceServer,
        JoinRoomPayload, RejoinRoomPayload, SignalPayload,
    },
    op::{event, rpc},
};
use crate::registry::{ConnHandle, RejoinOutcome, RoomRegistry};

// ----------------------------------------------------------------------------
// [공유 상태]
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub config:   Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub limiters: Arc<Limiters>,
}

// ----------------------------------------------------------------------------
// [WS 진입점]
// ----------------------------------------------------------------------------

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let remote_ip = resolve_remote_ip(&headers, Some(peer_addr));

    // 연결 수락 자체를 게이트 — 거절은 업그레이드 전에 일어난다
    if !state.limiters.connect.allow(&remote_ip) {
        warn!("connection refused (rate): ip={}", remote_ip);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            BrokerError::RateLimited(RateScope::Connection).to_string(),
        )
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, remote_ip))
}

/// X-Forwarded-For 첫 값 > 피어 주소 > "unknown"
fn resolve_remote_ip(headers: &HeaderMap, peer_addr: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// conn_id용 랜덤 문자열 생성 (alphanumeric 16자)
/// rand 크레이트 기반 CSPRNG 사용 — 연결 수명 동안 불변
fn random_conn_id() -> String {
    use rand::Rng;
    let charset: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

// ----------------------------------------------------------------------------
// [핵심] 개별 클라이언트 WS 생명주기
// ----------------------------------------------------------------------------

async fn handle_socket(socket: WebSocket, state: AppState, remote_ip: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (egress_tx, mut egress_rx) = mpsc::unbounded_channel::<String>();

    let conn = Arc::new(ConnHandle::new(random_conn_id(), remote_ip, egress_tx));
    info!("connection open: conn={} ip={}", conn.conn_id, conn.remote_ip);

    // [rx_loop] egress 큐 → WS 송신. 큐 적재 순서가 곧 배달 순서다.
    let rx_loop = tokio::spawn(async move {
        while let Some(json) = egress_rx.recv().await {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // [tx_loop] WS 수신 → dispatch. 유휴 타이머는 수신 대기에 걸리므로
    // 어떤 인바운드든 타이머를 리셋하고, 만료는 강제 종료가 된다.
    let idle = Duration::from_millis(state.config.idle_timeout_ms);
    loop {
        let msg = match tokio::time::timeout(idle, ws_rx.next()).await {
            Err(_) => {
                info!("idle timeout, closing: conn={}", conn.conn_id);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                warn!("WS 에러: conn={} {}", conn.conn_id, e);
                break;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        let text = match msg {
            Message::Text(t)  => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let packet: GatewayPacket = match serde_json::from_str(&text) {
            Ok(p)  => p,
            Err(e) => {
                warn!("잘못된 패킷 포맷: conn={} {}", conn.conn_id, e);
                conn.emit(event::ERROR, ErrorPayload { error: format!("Invalid packet: {}", e) });
                continue;
            }
        };

        dispatch(&state, &conn, packet);
    }

    // 어떤 종료 경로든 레지스트리 정리는 여기 한 곳에서
    state.registry.handle_disconnect(&conn.conn_id);
    rx_loop.abort();
    info!("connection closed: conn={} ip={}", conn.conn_id, conn.remote_ip);
}

// ----------------------------------------------------------------------------
// [dispatch] RPC 응답은 ack 봉투로, 도메인 에러는 data의 {error}로
// ----------------------------------------------------------------------------

fn dispatch(state: &AppState, conn: &Arc<ConnHandle>, packet: GatewayPacket) {
    let op = packet.op.clone();
    trace!("rpc: conn={} op={}", conn.conn_id, op);

    let result = match packet.op.as_str() {
        rpc::CREATE_ROOM     => rpc_create_room(state, conn),
        rpc::JOIN_ROOM       => rpc_join_room(state, conn, packet.d),
        rpc::APPROVE_PEER    => rpc_approve_peer(state, conn, packet.d),
        rpc::SIGNAL          => rpc_signal(state, conn, packet.d),
        rpc::REJOIN_ROOM     => rpc_rejoin_room(state, conn, packet.d),
        rpc::GET_ICE_SERVERS => Ok(json!({ "iceServers": ice_servers() })),
        unknown => {
            warn!("알 수 없는 op: conn={} op={}", conn.conn_id, unknown);
            conn.emit(event::ERROR, ErrorPayload { error: format!("Unknown method: {}", unknown) });
            return;
        }
    };

    let data = match result {
        Ok(value) => value,
        Err(e) if e.code() >= 9000 => {
            // 내부 불변식 위반 — 전체 컨텍스트를 남기고,
            // 디버그 빌드에서는 즉시 크래시시켜 조용히 묻히지 않게 한다
            error!("{} internal failure: conn={} ip={} code={} {}",
                op, conn.conn_id, conn.remote_ip, e.code(), e);
            if cfg!(debug_assertions) {
                panic!("invariant violation in {}: conn={} {}", op, conn.conn_id, e);
            }
            json!({ "error": e.to_string() })
        }
        Err(e) => {
            warn!("{} rejected: conn={} code={} {}", op, conn.conn_id, e.code(), e);
            json!({ "error": e.to_string() })
        }
    };
    conn.emit(event::ACK, AckPayload { op, data });
}

// ----------------------------------------------------------------------------
// [RPC 래퍼들]
// ----------------------------------------------------------------------------

fn rpc_create_room(state: &AppState, conn: &Arc<ConnHandle>) -> BrokerResult<Value> {
    if !state.limiters.room_create.allow(&conn.remote_ip) {
        return Err(BrokerError::RateLimited(RateScope::RoomCreate));
    }

    let room_code = state.registry.create_room(conn)?;
    Ok(json!({ "code": room_code, "iceServers": ice_servers() }))
}

fn rpc_join_room(state: &AppState, conn: &Arc<ConnHandle>, d: Option<Value>) -> BrokerResult<Value> {
    if !state.limiters.join.allow(&conn.remote_ip) {
        return Err(BrokerError::RateLimited(RateScope::Join));
    }

    let payload: JoinRoomPayload = parse_payload(d)?;
    let room_code = code::normalize(&payload.code);
    if !code::validate(&room_code) {
        return Err(BrokerError::InvalidCode);
    }
    let name = payload.name.unwrap_or_else(|| config::DEFAULT_PEER_NAME.to_string());

    let joined = state.registry.join_room(conn, &room_code, &name)?;
    Ok(json!({
        "success":        true,
        "peer_id":        joined.peer_id,
        "host_connected": joined.host_connected,
        "iceServers":     ice_servers(),
    }))
}

fn rpc_approve_peer(state: &AppState, conn: &Arc<ConnHandle>, d: Option<Value>) -> BrokerResult<Value> {
    let payload: ApprovePeerPayload = parse_payload(d)?;

    let outcome = state.registry.approve_peer(conn, &payload.peer_id, payload.approved)?;
    if outcome.denied {
        Ok(json!({ "success": true, "denied": true }))
    } else {
        info!("peer admitted: host={} peer={}", conn.conn_id, payload.peer_id);
        Ok(json!({ "success": true }))
    }
}

fn rpc_signal(state: &AppState, conn: &Arc<ConnHandle>, d: Option<Value>) -> BrokerResult<Value> {
    if !state.limiters.signal.allow(&conn.conn_id) {
        return Err(BrokerError::RateLimited(RateScope::Signal));
    }

    let payload: SignalPayload = parse_payload(d)?;

    // blob은 해석하지 않는다 — 직렬화 크기만 제한
    let size = serde_json::to_string(&payload.payload)
        .map(|s| s.len())
        .unwrap_or(usize::MAX);
    if size > state.config.max_payload_size {
        return Err(BrokerError::PayloadTooLarge);
    }

    state.registry.signal(conn, &payload.to, &payload.payload)?;
    Ok(json!({ "success": true }))
}

fn rpc_rejoin_room(state: &AppState, conn: &Arc<ConnHandle>, d: Option<Value>) -> BrokerResult<Value> {
    let payload: RejoinRoomPayload = parse_payload(d)?;
    let room_code = code::normalize(&payload.code);
    if !code::validate(&room_code) {
        return Err(BrokerError::InvalidCode);
    }
    let name = payload.name.unwrap_or_else(|| config::DEFAULT_PEER_NAME.to_string());

    match state.registry.rejoin_room(conn, &room_code, payload.is_host, &name)? {
        RejoinOutcome::Host { code, peers } => Ok(json!({
            "success": true,
            "code":    code,
            "peers":   peers,
        })),
        RejoinOutcome::Peer(joined) => Ok(json!({
            "success":        true,
            "peer_id":        joined.peer_id,
            "host_connected": joined.host_connected,
            "iceServers":     ice_servers(),
        })),
    }
}

// ----------------------------------------------------------------------------
// [내부 유틸]
// ----------------------------------------------------------------------------

fn parse_payload<T: serde::de::DeserializeOwned>(d: Option<Value>) -> Result<T, BrokerError> {
    let value = d.ok_or_else(|| BrokerError::InvalidPayload("missing payload".to_string()))?;
    serde_json::from_value(value).map_err(|e| BrokerError::InvalidPayload(e.to_string()))
}

fn ice_servers() -> Vec<IceServer> {
    config::STUN_SERVERS.iter()
        .map(|urls| IceServer { urls: urls.to_string() })
        .collect()
}
