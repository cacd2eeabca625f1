// author: kodeholic (powered by Claude)
// Admin 응답 DTO

use serde::Serialize;

/// 방 하나의 요약 (stats 응답의 rooms[] 항목)
#[derive(Serialize)]
pub struct AdminRoomSummary {
    pub code:           String,
    pub host_live:      bool,
    pub pending_count:  usize,
    pub approved_count: usize,
    pub created_at:     u64,
    pub age_seconds:    u64,
}

/// GET /admin/api/stats 응답
#[derive(Serialize)]
pub struct AdminStats {
    #[serde(rename = "totalRooms")]
    pub total_rooms:    usize,
    #[serde(rename = "totalPending")]
    pub total_pending:  usize,
    #[serde(rename = "totalApproved")]
    pub total_approved: usize,
    #[serde(rename = "uptimeSecs")]
    pub uptime_secs:    u64,
    pub rooms:          Vec<AdminRoomSummary>,
}
