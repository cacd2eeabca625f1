// author: kodeholic (powered by Claude)

use mini_rendezvous::code;
use mini_rendezvous::error::BrokerError;
use mini_rendezvous::registry::{ConnHandle, RejoinOutcome, RoomRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

// ----------------------------------------------------------------------------
// [테스트 헬퍼] 연결 스텁 — 송신 큐만 달린 ConnHandle
// ----------------------------------------------------------------------------

fn conn(id: &str, ip: &str) -> (Arc<ConnHandle>, UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ConnHandle::new(id.to_string(), ip.to_string(), tx)), rx)
}

fn next_event(rx: &mut UnboundedReceiver<String>) -> Value {
    let raw = rx.try_recv().expect("이벤트가 도착해 있어야 합니다.");
    serde_json::from_str(&raw).expect("이벤트는 JSON이어야 합니다.")
}

fn assert_no_event(rx: &mut UnboundedReceiver<String>) {
    assert!(rx.try_recv().is_err(), "더 이상 이벤트가 없어야 합니다.");
}

/// 기본 상한: IP당 방 5개, 방당 pending 10명
fn registry() -> RoomRegistry {
    RoomRegistry::new(5, 10)
}

// ----------------------------------------------------------------------------
// [방 생성]
// ----------------------------------------------------------------------------

#[test]
fn test_create_room_issues_valid_code() {
    let reg = registry();
    let (host, _host_rx) = conn("H1", "1.1.1.1");

    let room_code = reg.create_room(&host).unwrap();
    assert!(code::validate(&room_code), "발급 코드는 형태 검증을 통과해야 합니다.");
    assert!(reg.has_room(&room_code));
    assert!(reg.is_indexed("H1"));
    assert_eq!(reg.ip_rooms("1.1.1.1"), 1);
    assert!(reg.audit().is_empty(), "테이블 정합성이 유지되어야 합니다.");
}

#[test]
fn test_create_room_twice_rejected() {
    let reg = registry();
    let (host, _host_rx) = conn("H1", "1.1.1.1");

    reg.create_room(&host).unwrap();
    let err = reg.create_room(&host).unwrap_err();
    assert!(matches!(err, BrokerError::AlreadyInRoom), "중복 생성은 거절되어야 합니다.");
    assert_eq!(reg.room_count(), 1);
}

#[test]
fn test_ip_room_cap() {
    let reg = registry();
    let mut conns = Vec::new();
    for i in 0..5 {
        let (c, rx) = conn(&format!("H{}", i), "9.9.9.9");
        reg.create_room(&c).unwrap();
        conns.push((c, rx));
    }
    assert_eq!(reg.ip_rooms("9.9.9.9"), 5);

    let (sixth, _rx) = conn("H5", "9.9.9.9");
    let err = reg.create_room(&sixth).unwrap_err();
    assert_eq!(err.to_string(), "Maximum 5 rooms per IP reached.");

    // 다른 IP는 영향 없음
    let (other, _rx) = conn("HX", "8.8.8.8");
    assert!(reg.create_room(&other).is_ok());
}

// ----------------------------------------------------------------------------
// [시나리오] 참여 → 승인 → 시그널 왕복
// ----------------------------------------------------------------------------

#[test]
fn test_admission_and_signal_round_trip() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (peer, mut peer_rx) = conn("P", "2.2.2.2");
    let room_code = reg.create_room(&host).unwrap();

    // 참여 → 호스트에게 peer:request
    let joined = reg.join_room(&peer, &room_code, "Alice").unwrap();
    assert_eq!(joined.peer_id, "P");
    assert!(joined.host_connected, "호스트 수신측이 살아 있으므로 true여야 합니다.");

    let request = next_event(&mut host_rx);
    assert_eq!(request["op"], "peer:request");
    assert_eq!(request["d"]["peer_id"], "P");
    assert_eq!(request["d"]["name"], "Alice");

    // 승인 → 피어에게 peer:approved
    let outcome = reg.approve_peer(&host, "P", true).unwrap();
    assert!(!outcome.denied);

    let approved = next_event(&mut peer_rx);
    assert_eq!(approved["op"], "peer:approved");
    assert_eq!(approved["d"]["host_id"], "H");

    // 피어 → 호스트 시그널
    reg.signal(&peer, "H", &json!({ "sdp": "x" })).unwrap();
    let sig = next_event(&mut host_rx);
    assert_eq!(sig["op"], "signal");
    assert_eq!(sig["d"]["from"], "P");
    assert_eq!(sig["d"]["payload"]["sdp"], "x");

    // 호스트 → 피어 시그널
    reg.signal(&host, "P", &json!({ "sdp": "y" })).unwrap();
    let sig = next_event(&mut peer_rx);
    assert_eq!(sig["d"]["from"], "H");
    assert_eq!(sig["d"]["payload"]["sdp"], "y");

    assert!(reg.audit().is_empty());
}

#[test]
fn test_deny_removes_peer_but_keeps_connection_usable() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (peer, mut peer_rx) = conn("P", "2.2.2.2");
    let room_code = reg.create_room(&host).unwrap();

    reg.join_room(&peer, &room_code, "Mallory").unwrap();
    next_event(&mut host_rx); // peer:request 소비

    let outcome = reg.approve_peer(&host, "P", false).unwrap();
    assert!(outcome.denied);

    let denied = next_event(&mut peer_rx);
    assert_eq!(denied["op"], "peer:denied");

    // 거절 후에는 방 소속이 아니다
    assert!(!reg.is_indexed("P"));
    let err = reg.signal(&peer, "H", &json!({ "sdp": "x" })).unwrap_err();
    assert_eq!(err.to_string(), "Not in a room");
    assert_no_event(&mut host_rx);

    // 연결 자체는 살아 있어 새 방을 만들 수 있다
    assert!(reg.create_room(&peer).is_ok());
}

#[test]
fn test_pending_peer_cannot_signal() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (peer, _peer_rx) = conn("P", "2.2.2.2");
    let room_code = reg.create_room(&host).unwrap();

    reg.join_room(&peer, &room_code, "Eve").unwrap();
    next_event(&mut host_rx); // peer:request 소비

    let err = reg.signal(&peer, "H", &json!({ "sdp": "x" })).unwrap_err();
    assert_eq!(err.to_string(), "Not authorized to signal");
    assert_no_event(&mut host_rx);
}

#[test]
fn test_pending_peer_is_not_a_signal_target() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (approved, mut approved_rx) = conn("A", "2.2.2.2");
    let (pending, mut pending_rx) = conn("B", "3.3.3.3");
    let room_code = reg.create_room(&host).unwrap();

    reg.join_room(&approved, &room_code, "Alice").unwrap();
    reg.approve_peer(&host, "A", true).unwrap();
    reg.join_room(&pending, &room_code, "Bob").unwrap();
    next_event(&mut host_rx);
    next_event(&mut host_rx);
    next_event(&mut approved_rx); // peer:approved 소비

    let err = reg.signal(&approved, "B", &json!({ "sdp": "x" })).unwrap_err();
    assert!(matches!(err, BrokerError::TargetNotFound), "pending은 시그널 대상이 아니어야 합니다.");
    assert_no_event(&mut pending_rx);
}

#[test]
fn test_pending_flood_cap() {
    let reg = registry(); // 방당 pending 10명
    let (host, _host_rx) = conn("H", "1.1.1.1");
    let room_code = reg.create_room(&host).unwrap();

    let mut peers = Vec::new();
    for i in 0..10 {
        let (p, rx) = conn(&format!("P{}", i), "2.2.2.2");
        reg.join_room(&p, &room_code, "peer").unwrap();
        peers.push((p, rx));
    }

    let (eleventh, _rx) = conn("P10", "2.2.2.2");
    let err = reg.join_room(&eleventh, &room_code, "late").unwrap_err();
    assert_eq!(err.to_string(), "Room has too many pending requests. Please try again later.");
    assert!(!reg.is_indexed("P10"));
}

// ----------------------------------------------------------------------------
// [권한/조회 에러]
// ----------------------------------------------------------------------------

#[test]
fn test_join_errors() {
    let reg = registry();
    let (host, _host_rx) = conn("H", "1.1.1.1");
    let (peer, _peer_rx) = conn("P", "2.2.2.2");

    let err = reg.join_room(&peer, "abc-def-ghj", "x").unwrap_err();
    assert!(matches!(err, BrokerError::RoomNotFound));

    let room_code = reg.create_room(&host).unwrap();
    let err = reg.join_room(&host, &room_code, "x").unwrap_err();
    assert!(matches!(err, BrokerError::AlreadyInRoom), "호스트의 자기 방 참여는 거절되어야 합니다.");
}

#[test]
fn test_approve_requires_host() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (peer, _peer_rx) = conn("P", "2.2.2.2");
    let (outsider, _rx) = conn("O", "3.3.3.3");
    let room_code = reg.create_room(&host).unwrap();
    reg.join_room(&peer, &room_code, "Alice").unwrap();
    next_event(&mut host_rx);

    let err = reg.approve_peer(&outsider, "P", true).unwrap_err();
    assert!(matches!(err, BrokerError::NotAHost));

    let err = reg.approve_peer(&peer, "P", true).unwrap_err();
    assert!(matches!(err, BrokerError::NotAHost), "피어는 승인 권한이 없어야 합니다.");

    let err = reg.approve_peer(&host, "NOPE", true).unwrap_err();
    assert!(matches!(err, BrokerError::PeerNotPending));
}

// ----------------------------------------------------------------------------
// [disconnect] 호스트/피어 양 갈래
// ----------------------------------------------------------------------------

#[test]
fn test_host_disconnect_destroys_room() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (approved, mut approved_rx) = conn("A", "2.2.2.2");
    let (pending, mut pending_rx) = conn("B", "3.3.3.3");
    let room_code = reg.create_room(&host).unwrap();

    reg.join_room(&approved, &room_code, "Alice").unwrap();
    reg.approve_peer(&host, "A", true).unwrap();
    reg.join_room(&pending, &room_code, "Bob").unwrap();
    next_event(&mut host_rx);
    next_event(&mut host_rx);
    next_event(&mut approved_rx);

    reg.handle_disconnect("H");

    // pending/approved 모두 host:disconnected를 정확히 1회 수신
    let down = next_event(&mut approved_rx);
    assert_eq!(down["op"], "host:disconnected");
    assert_no_event(&mut approved_rx);

    let down = next_event(&mut pending_rx);
    assert_eq!(down["op"], "host:disconnected");
    assert_no_event(&mut pending_rx);

    assert!(!reg.has_room(&room_code), "호스트 disconnect는 방을 즉시 파괴해야 합니다.");
    assert_eq!(reg.ip_rooms("1.1.1.1"), 0);
    assert!(!reg.is_indexed("H"));
    assert!(!reg.is_indexed("A"));
    assert!(!reg.is_indexed("B"));
    assert!(reg.audit().is_empty());
}

#[test]
fn test_peer_disconnect_notifies_host() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (peer, mut peer_rx) = conn("P", "2.2.2.2");
    let room_code = reg.create_room(&host).unwrap();
    reg.join_room(&peer, &room_code, "Alice").unwrap();
    reg.approve_peer(&host, "P", true).unwrap();
    next_event(&mut host_rx);
    next_event(&mut peer_rx);

    reg.handle_disconnect("P");

    let gone = next_event(&mut host_rx);
    assert_eq!(gone["op"], "peer:disconnected");
    assert_eq!(gone["d"]["peer_id"], "P");

    assert!(reg.has_room(&room_code), "피어 disconnect로 방이 사라지면 안 됩니다.");
    assert!(!reg.is_indexed("P"));
    assert!(reg.audit().is_empty());
}

#[test]
fn test_disconnect_unknown_conn_is_noop() {
    let reg = registry();
    reg.handle_disconnect("GHOST");
    assert_eq!(reg.room_count(), 0);
}

// ----------------------------------------------------------------------------
// [rejoin] 호스트 복귀 / 파괴 후 복귀
// ----------------------------------------------------------------------------

#[test]
fn test_host_rejoin_preserves_approved_peers() {
    let reg = registry();
    let (host, _host_rx) = conn("H1", "1.1.1.1");
    let (peer, mut peer_rx) = conn("P", "2.2.2.2");
    let room_code = reg.create_room(&host).unwrap();
    reg.join_room(&peer, &room_code, "Alice").unwrap();
    reg.approve_peer(&host, "P", true).unwrap();
    next_event(&mut peer_rx); // peer:approved 소비

    // 좀비 전송을 대체하는 새 연결로 복귀
    let (new_host, _new_rx) = conn("H2", "1.1.1.1");
    let outcome = reg.rejoin_room(&new_host, &room_code, true, "").unwrap();
    let peers = match outcome {
        RejoinOutcome::Host { code, peers } => {
            assert_eq!(code, room_code);
            peers
        }
        RejoinOutcome::Peer(_) => panic!("호스트 복귀 결과여야 합니다."),
    };
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].id, "P");
    assert_eq!(peers[0].name, "Alice");

    // approved 피어는 host:reconnected를 정확히 1회 수신
    let reconnected = next_event(&mut peer_rx);
    assert_eq!(reconnected["op"], "host:reconnected");
    assert_eq!(reconnected["d"]["host_id"], "H2");
    assert_no_event(&mut peer_rx);

    // 교체된 옛 연결의 disconnect는 방을 건드리지 못한다
    reg.handle_disconnect("H1");
    assert!(reg.has_room(&room_code));
    assert!(reg.audit().is_empty());

    // 새 호스트로 시그널 왕복 가능
    reg.signal(&peer, "H2", &json!({ "ice": "c" })).unwrap();
}

#[test]
fn test_host_rejoin_after_destroy_fails() {
    let reg = registry();
    let (host, _host_rx) = conn("H1", "1.1.1.1");
    let room_code = reg.create_room(&host).unwrap();

    reg.handle_disconnect("H1"); // 방 동기 파괴

    let (new_host, _rx) = conn("H2", "1.1.1.1");
    let err = reg.rejoin_room(&new_host, &room_code, true, "").unwrap_err();
    assert_eq!(err.to_string(), "Room not found");
}

#[test]
fn test_peer_rejoin_requires_reapproval() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (peer, _peer_rx) = conn("P1", "2.2.2.2");
    let room_code = reg.create_room(&host).unwrap();
    reg.join_room(&peer, &room_code, "Alice").unwrap();
    reg.approve_peer(&host, "P1", true).unwrap();
    next_event(&mut host_rx);

    reg.handle_disconnect("P1");
    next_event(&mut host_rx); // peer:disconnected 소비

    // 새 연결의 피어 복귀는 일반 join — pending부터 다시
    let (back, _rx) = conn("P2", "2.2.2.2");
    let outcome = reg.rejoin_room(&back, &room_code, false, "Alice").unwrap();
    match outcome {
        RejoinOutcome::Peer(joined) => assert_eq!(joined.peer_id, "P2"),
        RejoinOutcome::Host { .. } => panic!("피어 복귀 결과여야 합니다."),
    }
    let request = next_event(&mut host_rx);
    assert_eq!(request["op"], "peer:request", "재승인 요청이 다시 가야 합니다.");
}

// ----------------------------------------------------------------------------
// [어드민] 스냅샷 / 강제 종료
// ----------------------------------------------------------------------------

#[test]
fn test_snapshot_counts() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (a, _a_rx) = conn("A", "2.2.2.2");
    let (b, _b_rx) = conn("B", "3.3.3.3");
    let room_code = reg.create_room(&host).unwrap();
    reg.join_room(&a, &room_code, "a").unwrap();
    reg.join_room(&b, &room_code, "b").unwrap();
    reg.approve_peer(&host, "A", true).unwrap();
    next_event(&mut host_rx);
    next_event(&mut host_rx);

    let snapshot = reg.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].code, room_code);
    assert!(snapshot[0].host_live);
    assert_eq!(snapshot[0].pending_count, 1);
    assert_eq!(snapshot[0].approved_count, 1);
    assert!(snapshot[0].created_at > 0);
}

#[test]
fn test_admin_close_room() {
    let reg = registry();
    let (host, mut host_rx) = conn("H", "1.1.1.1");
    let (peer, mut peer_rx) = conn("P", "2.2.2.2");
    let room_code = reg.create_room(&host).unwrap();
    reg.join_room(&peer, &room_code, "Alice").unwrap();
    reg.approve_peer(&host, "P", true).unwrap();
    next_event(&mut host_rx);
    next_event(&mut peer_rx);

    reg.close_room(&room_code).unwrap();

    let down = next_event(&mut peer_rx);
    assert_eq!(down["op"], "host:disconnected");
    let closed = next_event(&mut host_rx);
    assert_eq!(closed["op"], "room:closed");

    assert!(!reg.has_room(&room_code));
    assert_eq!(reg.ip_rooms("1.1.1.1"), 0);
    assert!(reg.audit().is_empty());

    let err = reg.close_room(&room_code).unwrap_err();
    assert!(matches!(err, BrokerError::RoomNotFound));
}
