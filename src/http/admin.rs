// author: kodeholic (powered by Claude)
// Admin REST API 핸들러
//
// 조회
//   GET /admin            → 방 현황 HTML 스냅샷
//   GET /admin/api/stats  → JSON {totalRooms, totalPending, totalApproved, rooms:[…]}
//
// 조작
//   POST /admin/api/rooms/{code}/close → 방 강제 파괴
//
// ADMIN_PASSWORD 미설정 시 이 라우터는 아예 마운트되지 않는다(lib.rs).
// 설정 시 ?password= 쿼리 또는 Authorization: Bearer 로 확인한다.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use std::collections::HashMap;

use crate::code;
use crate::utils::age_seconds;

use super::dto::{AdminRoomSummary, AdminStats};
use super::state::HttpState;

// ----------------------------------------------------------------------------
// [인증]
// ----------------------------------------------------------------------------

/// 쿼리 password 또는 Bearer 토큰이 설정값과 일치하는지
fn authorized(state: &HttpState, headers: &HeaderMap, query: &HashMap<String, String>) -> bool {
    let expected = match state.config.admin_password.as_deref() {
        Some(pw) => pw,
        None     => return false, // 미설정이면 라우터가 없지만, 방어적으로 거절
    };

    if query.get("password").map(String::as_str) == Some(expected) {
        return true;
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == expected)
        .unwrap_or(false)
}

fn unauthorized() -> axum::response::Response {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({
        "error": "Unauthorized"
    }))).into_response()
}

// ----------------------------------------------------------------------------
// [스냅샷 조립]
// ----------------------------------------------------------------------------

fn build_stats(state: &HttpState) -> AdminStats {
    let mut rooms: Vec<AdminRoomSummary> = state.registry.snapshot()
        .into_iter()
        .map(|room| AdminRoomSummary {
            code:           room.code,
            host_live:      room.host_live,
            pending_count:  room.pending_count,
            approved_count: room.approved_count,
            created_at:     room.created_at,
            age_seconds:    age_seconds(room.created_at),
        })
        .collect();
    rooms.sort_by(|a, b| a.code.cmp(&b.code));

    AdminStats {
        total_rooms:    rooms.len(),
        total_pending:  rooms.iter().map(|r| r.pending_count).sum(),
        total_approved: rooms.iter().map(|r| r.approved_count).sum(),
        uptime_secs:    age_seconds(state.start_time_ms),
        rooms,
    }
}

// ----------------------------------------------------------------------------
// [핸들러]
// ----------------------------------------------------------------------------

/// GET /admin/api/stats
pub async fn admin_stats(
    State(state): State<HttpState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&state, &headers, &query) {
        return unauthorized();
    }
    Json(build_stats(&state)).into_response()
}

/// GET /admin — 새로고침으로 보는 정적 스냅샷 페이지
pub async fn admin_page(
    State(state): State<HttpState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&state, &headers, &query) {
        return unauthorized();
    }

    let stats = build_stats(&state);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta http-equiv=\"refresh\" content=\"5\">\n");
    html.push_str("<title>mini-rendezvous admin</title>\n");
    html.push_str("<style>body{font-family:monospace;margin:2em}table{border-collapse:collapse}\
td,th{border:1px solid #999;padding:4px 10px;text-align:left}th{background:#eee}</style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str("<h1>mini-rendezvous</h1>\n");
    html.push_str(&format!(
        "<p>uptime {}s · rooms {} · pending {} · approved {}</p>\n",
        stats.uptime_secs, stats.total_rooms, stats.total_pending, stats.total_approved,
    ));
    html.push_str("<table>\n<tr><th>CODE</th><th>HOST</th><th>PENDING</th><th>APPROVED</th><th>AGE(s)</th></tr>\n");
    for room in &stats.rooms {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            room.code,
            if room.host_live { "live" } else { "gone" },
            room.pending_count,
            room.approved_count,
            room.age_seconds,
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");

    Html(html).into_response()
}

/// POST /admin/api/rooms/{code}/close
pub async fn admin_close_room(
    State(state): State<HttpState>,
    Path(raw_code): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&state, &headers, &query) {
        return unauthorized();
    }

    let room_code = code::normalize(&raw_code);
    match state.registry.close_room(&room_code) {
        Ok(())   => Json(serde_json::json!({ "ok": true, "code": room_code })).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(serde_json::json!({
            "error": e.to_string()
        }))).into_response(),
    }
}
