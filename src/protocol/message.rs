// author: kodeholic (powered by Claude)

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// [공통] Gateway 패킷 봉투 (Envelope)
// ----------------------------------------------------------------------------

/// 모든 WebSocket 메시지의 최상위 구조체
/// 수신/송신 공통으로 사용하며, payload는 op에 따라 해석합니다.
///
/// 예시:
///   { "op": "joinRoom", "d": { "code": "abc-def-ghj", "name": "Alice" } }
#[derive(Serialize, Deserialize, Debug)]
pub struct GatewayPacket {
    /// RPC 메서드 또는 이벤트 이름 (protocol::op 참조)
    pub op: String,
    /// payload. op에 따라 구조가 달라지므로 raw JSON으로 보관
    pub d: Option<serde_json::Value>,
}

impl GatewayPacket {
    pub fn new(op: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            op: op.into(),
            d:  Some(serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)),
        }
    }

    pub fn no_data(op: impl Into<String>) -> Self {
        Self { op: op.into(), d: None }
    }
}

// ----------------------------------------------------------------------------
// [C→S] RPC 요청 payload 타입들
// ----------------------------------------------------------------------------

/// op: joinRoom
#[derive(Deserialize, Debug)]
pub struct JoinRoomPayload {
    pub code: String,
    /// 생략 시 "Anonymous"
    #[serde(default)]
    pub name: Option<String>,
}

/// op: approvePeer
#[derive(Deserialize, Debug)]
pub struct ApprovePeerPayload {
    pub peer_id:  String,
    pub approved: bool,
}

/// op: signal — payload는 불투명 blob 그대로 전달
#[derive(Deserialize, Debug)]
pub struct SignalPayload {
    pub to:      String,
    pub payload: serde_json::Value,
}

/// op: rejoinRoom
#[derive(Deserialize, Debug)]
pub struct RejoinRoomPayload {
    pub code: String,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub name: Option<String>,
}

// ----------------------------------------------------------------------------
// [S→C] 응답/이벤트 payload 타입들
// ----------------------------------------------------------------------------

/// op: ack — RPC 응답. data는 메서드마다 다르므로 raw Value 사용.
/// 도메인 에러는 data에 { "error": "..." } 로 실린다.
#[derive(Serialize, Debug)]
pub struct AckPayload {
    pub op:   String,
    pub data: serde_json::Value,
}

/// op: error — 프로토콜 레벨 에러 (파싱 실패 등)
#[derive(Serialize, Debug)]
pub struct ErrorPayload {
    pub error: String,
}

/// op: peer:request — 호스트에게 참여 요청 통지
#[derive(Serialize, Debug)]
pub struct PeerRequestPayload {
    pub peer_id: String,
    pub name:    String,
}

/// op: peer:approved
#[derive(Serialize, Debug)]
pub struct PeerApprovedPayload {
    pub host_id: String,
}

/// op: host:reconnected
#[derive(Serialize, Debug)]
pub struct HostReconnectedPayload {
    pub host_id: String,
}

/// op: peer:disconnected
#[derive(Serialize, Debug)]
pub struct PeerDisconnectedPayload {
    pub peer_id: String,
}

/// op: signal — 수신측에 배달되는 형태
#[derive(Serialize, Debug)]
pub struct SignalEventPayload {
    pub from:    String,
    pub payload: serde_json::Value,
}

// ----------------------------------------------------------------------------
// [공통] 방 멤버/ICE 정보
// ----------------------------------------------------------------------------

/// rejoinRoom(호스트) 응답의 생존 피어 항목
#[derive(Serialize, Debug, Clone)]
pub struct RoomPeerInfo {
    pub id:   String,
    pub name: String,
}

/// createRoom/joinRoom/getIceServers 응답에 실리는 STUN 힌트
#[derive(Serialize, Debug, Clone)]
pub struct IceServer {
    pub urls: String,
}
