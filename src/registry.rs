// author: kodeholic (powered by Claude)
// 네트워크 로직과 철저히 분리된, 순수 비즈니스 상태 관리 모듈입니다.
//
// [RoomRegistry] 방 제어 평면
//   rooms         : code → Room (주 테이블)
//   conn_index    : conn_id → {code, role} (disconnect/signal용 O(1) 역참조)
//   ip_room_count : ip → 호스팅 중인 방 개수
//
// 세 테이블은 Mutex 하나로 함께 보호된다. 모든 연산은 락 안에서 끝나는
// 동기 트랜잭션이고, 이벤트 송신도 락 안에서 unbounded 큐에 넣으므로
// 단일 연결 기준 송신 순서가 보존된다. 락 안에 await 지점은 없다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, trace, warn};

use crate::code;
use crate::error::{BrokerError, BrokerResult};
use crate::protocol::message::{
    GatewayPacket, HostReconnectedPayload, PeerApprovedPayload, PeerDisconnectedPayload,
    PeerRequestPayload, RoomPeerInfo, SignalEventPayload,
};
use crate::protocol::op::event;
use crate::utils::now_millis;
use tokio::sync::mpsc;

// ----------------------------------------------------------------------------
// [ConnHandle] 트랜스포트가 넘겨주는 연결 핸들
// 소유권은 트랜스포트(세션 태스크)에 있고, 방은 참조만 보관한다.
// ----------------------------------------------------------------------------

pub struct ConnHandle {
    /// 연결 수명 동안 불변인 식별자
    pub conn_id:   String,
    /// X-Forwarded-For 첫 값 > 피어 주소 > "unknown"
    pub remote_ip: String,
    /// 연결별 송신 큐 — 세션 태스크가 WS로 배출
    tx: mpsc::UnboundedSender<String>,
}

impl ConnHandle {
    pub fn new(conn_id: String, remote_ip: String, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { conn_id, remote_ip, tx }
    }

    /// 수신측 세션 태스크가 살아 있는지
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    /// fire-and-forget 이벤트 송신. 닫힌 연결이면 drop하고 로그만 남긴다.
    pub fn emit(&self, op: &str, payload: impl Serialize) {
        let packet = serde_json::to_string(&GatewayPacket::new(op, payload)).unwrap_or_default();
        if self.tx.send(packet).is_err() {
            warn!("emit dropped (rx closed): conn={} op={}", self.conn_id, op);
        }
    }
}

// ----------------------------------------------------------------------------
// [Room] 방 하나의 상태
// ----------------------------------------------------------------------------

/// 방 안에서 피어 하나를 나타내는 레코드. conn은 참조일 뿐 소유가 아니다.
pub struct PeerEntry {
    pub conn: Arc<ConnHandle>,
    pub name: String,
}

pub struct Room {
    pub code:       String,
    /// 현재 호스트 연결 — rejoin 시 교체될 수 있음
    pub host:       Arc<ConnHandle>,
    /// host.conn_id 캐시 (권한 검사용)
    pub host_id:    String,
    /// 방을 만든 IP — 파괴 시 이 키의 카운터를 내린다
    pub owner_ip:   String,
    /// 호스트 결정 대기 중인 피어들
    pub pending:    HashMap<String, PeerEntry>,
    /// 시그널링이 허용된 피어들
    pub approved:   HashMap<String, PeerEntry>,
    pub created_at: u64,
}

/// 역참조 인덱스에서의 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Peer,
}

struct IndexEntry {
    code:      String,
    role:      Role,
    peer_name: Option<String>,
}

// ----------------------------------------------------------------------------
// [연산 결과 타입]
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct JoinOutcome {
    pub peer_id:        String,
    pub host_connected: bool,
}

#[derive(Debug)]
pub struct ApproveOutcome {
    pub denied: bool,
}

#[derive(Debug)]
pub enum RejoinOutcome {
    /// 호스트 복귀 — 살아남은 approved 피어 목록 포함
    Host { code: String, peers: Vec<RoomPeerInfo> },
    /// 피어 복귀는 일반 join과 동일 (재승인 필요)
    Peer(JoinOutcome),
}

/// 어드민 뷰용 방 요약 — 단일 락 안에서 일관되게 찍힌다
pub struct RoomSnapshot {
    pub code:           String,
    pub host_live:      bool,
    pub pending_count:  usize,
    pub approved_count: usize,
    pub created_at:     u64,
}

// ----------------------------------------------------------------------------
// [RoomRegistry]
// ----------------------------------------------------------------------------

struct RegistryInner {
    rooms:         HashMap<String, Room>,
    conn_index:    HashMap<String, IndexEntry>,
    ip_room_count: HashMap<String, usize>,
}

pub struct RoomRegistry {
    max_rooms_per_ip:     usize,
    max_pending_per_room: usize,
    inner:                Mutex<RegistryInner>,
}

impl RoomRegistry {
    pub fn new(max_rooms_per_ip: usize, max_pending_per_room: usize) -> Self {
        trace!("Initializing RoomRegistry");
        Self {
            max_rooms_per_ip,
            max_pending_per_room,
            inner: Mutex::new(RegistryInner {
                rooms:         HashMap::new(),
                conn_index:    HashMap::new(),
                ip_room_count: HashMap::new(),
            }),
        }
    }

    /// 방 생성. IP당 방 개수 체크와 카운터 증가까지 같은 락 안에서 처리해
    /// 동시 생성이 상한을 뚫지 못하게 한다. 성공 시 코드 반환.
    pub fn create_room(&self, conn: &Arc<ConnHandle>) -> BrokerResult<String> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        if inner.conn_index.contains_key(&conn.conn_id) {
            return Err(BrokerError::AlreadyInRoom);
        }

        let hosted = inner.ip_room_count.get(&conn.remote_ip).copied().unwrap_or(0);
        if hosted >= self.max_rooms_per_ip {
            return Err(BrokerError::IpRoomCap(self.max_rooms_per_ip));
        }

        // 충돌 시 재추첨 — 동시 방 ~10^5 이하에서는 사실상 1회에 끝난다
        let room_code = loop {
            let candidate = code::generate();
            if !inner.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        inner.rooms.insert(room_code.clone(), Room {
            code:       room_code.clone(),
            host:       Arc::clone(conn),
            host_id:    conn.conn_id.clone(),
            owner_ip:   conn.remote_ip.clone(),
            pending:    HashMap::new(),
            approved:   HashMap::new(),
            created_at: now_millis(),
        });
        inner.conn_index.insert(conn.conn_id.clone(), IndexEntry {
            code:      room_code.clone(),
            role:      Role::Host,
            peer_name: None,
        });
        *inner.ip_room_count.entry(conn.remote_ip.clone()).or_insert(0) += 1;

        info!("room created: code={} host={} ip={}", room_code, conn.conn_id, conn.remote_ip);
        Ok(room_code)
    }

    /// 방 참여 요청 — pending에 들어가고 호스트에게 peer:request가 간다.
    pub fn join_room(&self, conn: &Arc<ConnHandle>, room_code: &str, name: &str) -> BrokerResult<JoinOutcome> {
        let mut guard = self.inner.lock().unwrap();
        Self::join_locked(&mut guard, self.max_pending_per_room, conn, room_code, name)
    }

    /// join의 락 보유 본체 — rejoin(비호스트)도 이 경로를 탄다.
    fn join_locked(
        inner:       &mut RegistryInner,
        max_pending: usize,
        conn:        &Arc<ConnHandle>,
        room_code:   &str,
        name:        &str,
    ) -> BrokerResult<JoinOutcome> {
        if !inner.rooms.contains_key(room_code) {
            return Err(BrokerError::RoomNotFound);
        }
        if inner.conn_index.contains_key(&conn.conn_id) {
            return Err(BrokerError::AlreadyInRoom);
        }

        let room = inner.rooms.get_mut(room_code)
            .ok_or_else(|| BrokerError::Internal("room vanished under lock".into()))?;

        // 플러딩 방어 — 승인 대기열 상한
        if room.pending.len() >= max_pending {
            return Err(BrokerError::PendingFull);
        }

        room.pending.insert(conn.conn_id.clone(), PeerEntry {
            conn: Arc::clone(conn),
            name: name.to_string(),
        });
        let host_connected = room.host.is_live();
        room.host.emit(event::PEER_REQUEST, PeerRequestPayload {
            peer_id: conn.conn_id.clone(),
            name:    name.to_string(),
        });

        inner.conn_index.insert(conn.conn_id.clone(), IndexEntry {
            code:      room_code.to_string(),
            role:      Role::Peer,
            peer_name: Some(name.to_string()),
        });

        trace!("peer pending: room={} peer={} name={}", room_code, conn.conn_id, name);
        Ok(JoinOutcome {
            peer_id: conn.conn_id.clone(),
            host_connected,
        })
    }

    /// 호스트의 승인/거절. 승인 시 pending → approved 이동,
    /// 거절 시 피어는 방에서 완전히 빠지지만 연결 자체는 살아 있다.
    pub fn approve_peer(
        &self,
        host_conn: &Arc<ConnHandle>,
        peer_id:   &str,
        approved:  bool,
    ) -> BrokerResult<ApproveOutcome> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let room_code = match inner.conn_index.get(&host_conn.conn_id) {
            Some(entry) if entry.role == Role::Host => entry.code.clone(),
            _ => return Err(BrokerError::NotAHost),
        };
        let room = inner.rooms.get_mut(&room_code)
            .ok_or_else(|| BrokerError::Internal("host indexed but room missing".into()))?;

        let entry = room.pending.remove(peer_id)
            .ok_or(BrokerError::PeerNotPending)?;

        if approved {
            entry.conn.emit(event::PEER_APPROVED, PeerApprovedPayload {
                host_id: room.host_id.clone(),
            });
            room.approved.insert(peer_id.to_string(), entry);
            trace!("peer approved: room={} peer={}", room_code, peer_id);
            Ok(ApproveOutcome { denied: false })
        } else {
            entry.conn.emit(event::PEER_DENIED, json!({}));
            inner.conn_index.remove(peer_id);
            trace!("peer denied: room={} peer={}", room_code, peer_id);
            Ok(ApproveOutcome { denied: true })
        }
    }

    /// 시그널 라우팅. 발신자는 호스트이거나 approved여야 하고,
    /// 수신자는 호스트 또는 approved만 가능하다(pending은 대상이 될 수 없음).
    /// payload는 불투명 blob — 여기서는 파싱하지 않는다.
    pub fn signal(&self, from: &Arc<ConnHandle>, to_id: &str, payload: &Value) -> BrokerResult<()> {
        let inner = self.inner.lock().unwrap();

        let entry = inner.conn_index.get(&from.conn_id)
            .ok_or(BrokerError::NotInRoom)?;
        let room = inner.rooms.get(&entry.code)
            .ok_or_else(|| BrokerError::Internal("conn indexed but room missing".into()))?;

        let authorized = from.conn_id == room.host_id || room.approved.contains_key(&from.conn_id);
        if !authorized {
            return Err(BrokerError::NotAuthorized);
        }

        let target = if to_id == room.host_id {
            &room.host
        } else {
            match room.approved.get(to_id) {
                Some(peer) => &peer.conn,
                None => return Err(BrokerError::TargetNotFound),
            }
        };

        target.emit(event::SIGNAL, SignalEventPayload {
            from:    from.conn_id.clone(),
            payload: payload.clone(),
        });
        Ok(())
    }

    /// 재참여. 호스트는 새 연결로 방을 이어받고(approved 유지),
    /// 피어는 일반 join으로 되돌아가 재승인을 받는다.
    pub fn rejoin_room(
        &self,
        conn:      &Arc<ConnHandle>,
        room_code: &str,
        is_host:   bool,
        name:      &str,
    ) -> BrokerResult<RejoinOutcome> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        if !is_host {
            return Self::join_locked(inner, self.max_pending_per_room, conn, room_code, name)
                .map(RejoinOutcome::Peer);
        }

        if !inner.rooms.contains_key(room_code) {
            return Err(BrokerError::RoomNotFound);
        }

        // 새 연결이 이미 다른 방에 묶여 있으면 거절.
        // 현 호스트 본인의 재호출(리싱크)만 예외로 허용한다.
        if let Some(existing) = inner.conn_index.get(&conn.conn_id) {
            let is_self_resync = existing.role == Role::Host && existing.code == room_code;
            if !is_self_resync {
                return Err(BrokerError::AlreadyInRoom);
            }
        }

        let old_host_id = inner.rooms.get(room_code)
            .map(|r| r.host_id.clone())
            .unwrap_or_default();
        if old_host_id != conn.conn_id {
            // 교체된 좀비 호스트 연결은 인덱스에서 제거 —
            // 그쪽 disconnect가 나중에 와도 방을 건드리지 못한다
            inner.conn_index.remove(&old_host_id);
        }

        let room = inner.rooms.get_mut(room_code)
            .ok_or_else(|| BrokerError::Internal("room vanished under lock".into()))?;
        room.host    = Arc::clone(conn);
        room.host_id = conn.conn_id.clone();

        inner.conn_index.insert(conn.conn_id.clone(), IndexEntry {
            code:      room_code.to_string(),
            role:      Role::Host,
            peer_name: None,
        });

        let peers: Vec<RoomPeerInfo> = room.approved.iter()
            .map(|(id, entry)| RoomPeerInfo { id: id.clone(), name: entry.name.clone() })
            .collect();
        for entry in room.approved.values() {
            entry.conn.emit(event::HOST_RECONNECTED, HostReconnectedPayload {
                host_id: conn.conn_id.clone(),
            });
        }

        info!("host reconnected: room={} old={} new={}", room_code, old_host_id, conn.conn_id);
        Ok(RejoinOutcome::Host { code: room_code.to_string(), peers })
    }

    /// 트랜스포트 disconnect 처리. 인덱스에 없으면 no-op.
    /// 호스트면 방 전체가 내려가고, 피어면 본인 엔트리만 빠진다.
    pub fn handle_disconnect(&self, conn_id: &str) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let entry = match inner.conn_index.get(conn_id) {
            Some(e) => e,
            None    => return,
        };
        let room_code = entry.code.clone();
        let role      = entry.role;
        let peer_name = entry.peer_name.clone();

        match role {
            Role::Host => {
                if let Some(room) = inner.rooms.remove(&room_code) {
                    // 피어 연결 자체는 끊지 않는다 — 새 createRoom/joinRoom이 가능해야 함
                    for (peer_id, peer) in room.pending.iter().chain(room.approved.iter()) {
                        peer.conn.emit(event::HOST_DISCONNECTED, json!({}));
                        inner.conn_index.remove(peer_id);
                    }
                    Self::release_room_slot(&mut inner.ip_room_count, &room.owner_ip);
                    info!("room destroyed (host disconnect): code={} host={} peers_notified={}",
                        room_code, conn_id, room.pending.len() + room.approved.len());
                }
            }
            Role::Peer => {
                if let Some(room) = inner.rooms.get_mut(&room_code) {
                    room.pending.remove(conn_id);
                    room.approved.remove(conn_id);
                    room.host.emit(event::PEER_DISCONNECTED, PeerDisconnectedPayload {
                        peer_id: conn_id.to_string(),
                    });
                    trace!("peer disconnected: room={} peer={} name={}",
                        room_code, conn_id, peer_name.as_deref().unwrap_or("-"));
                }
            }
        }

        inner.conn_index.remove(conn_id);
    }

    /// 어드민 조작 — 방 강제 파괴. 피어들은 호스트가 끊겼을 때와 같은
    /// 경로(host:disconnected)로 내려가고, 호스트에게는 room:closed를 보낸다.
    pub fn close_room(&self, room_code: &str) -> BrokerResult<()> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let room = inner.rooms.remove(room_code)
            .ok_or(BrokerError::RoomNotFound)?;

        for (peer_id, peer) in room.pending.iter().chain(room.approved.iter()) {
            peer.conn.emit(event::HOST_DISCONNECTED, json!({}));
            inner.conn_index.remove(peer_id);
        }
        room.host.emit(event::ROOM_CLOSED, json!({}));
        inner.conn_index.remove(&room.host_id);
        Self::release_room_slot(&mut inner.ip_room_count, &room.owner_ip);

        warn!("room closed by admin: code={} host={}", room_code, room.host_id);
        Ok(())
    }

    /// owner_ip의 호스팅 카운터 감소 — 0이 되면 키 제거
    fn release_room_slot(ip_room_count: &mut HashMap<String, usize>, owner_ip: &str) {
        if let Some(count) = ip_room_count.get_mut(owner_ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                ip_room_count.remove(owner_ip);
            }
        }
    }

    // ------------------------------------------------------------------------
    // [조회] 어드민 뷰 / 운영 확인용 읽기 전용 표면
    // ------------------------------------------------------------------------

    /// 전체 방 요약 — 락 한 번으로 일관된 뷰를 찍는다
    pub fn snapshot(&self) -> Vec<RoomSnapshot> {
        let inner = self.inner.lock().unwrap();
        inner.rooms.values()
            .map(|room| RoomSnapshot {
                code:           room.code.clone(),
                host_live:      room.host.is_live(),
                pending_count:  room.pending.len(),
                approved_count: room.approved.len(),
                created_at:     room.created_at,
            })
            .collect()
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().unwrap().rooms.len()
    }

    pub fn has_room(&self, room_code: &str) -> bool {
        self.inner.lock().unwrap().rooms.contains_key(room_code)
    }

    pub fn is_indexed(&self, conn_id: &str) -> bool {
        self.inner.lock().unwrap().conn_index.contains_key(conn_id)
    }

    /// 해당 IP가 호스팅 중인 방 개수
    pub fn ip_rooms(&self, ip: &str) -> usize {
        self.inner.lock().unwrap().ip_room_count.get(ip).copied().unwrap_or(0)
    }

    /// 테이블 정합성 감사 — 불일치 목록 반환 (비면 정상).
    /// pending/approved 분리, 호스트 비멤버십, 인덱스 양방향 일치를 본다.
    pub fn audit(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut faults = Vec::new();

        for room in inner.rooms.values() {
            for peer_id in room.pending.keys() {
                if room.approved.contains_key(peer_id) {
                    faults.push(format!("room {}: {} in both pending and approved", room.code, peer_id));
                }
            }
            if room.pending.contains_key(&room.host_id) || room.approved.contains_key(&room.host_id) {
                faults.push(format!("room {}: host {} is a member of itself", room.code, room.host_id));
            }

            // 방 → 인덱스 방향
            let members = room.pending.keys()
                .chain(room.approved.keys())
                .chain(std::iter::once(&room.host_id));
            for conn_id in members {
                match inner.conn_index.get(conn_id) {
                    Some(entry) if entry.code == room.code => {}
                    Some(entry) => faults.push(format!(
                        "conn {}: indexed to {} but member of {}", conn_id, entry.code, room.code)),
                    None => faults.push(format!(
                        "conn {}: member of {} but not indexed", conn_id, room.code)),
                }
            }
        }

        // 인덱스 → 방 방향
        for (conn_id, entry) in inner.conn_index.iter() {
            match inner.rooms.get(&entry.code) {
                None => faults.push(format!("conn {}: indexed to missing room {}", conn_id, entry.code)),
                Some(room) => {
                    let present = match entry.role {
                        Role::Host => room.host_id == *conn_id,
                        Role::Peer => room.pending.contains_key(conn_id)
                            || room.approved.contains_key(conn_id),
                    };
                    if !present {
                        faults.push(format!(
                            "conn {}: indexed to {} as {:?} but absent from room", conn_id, entry.code, entry.role));
                    }
                }
            }
        }

        faults
    }
}
