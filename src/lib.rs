// author: kodeholic (powered by Claude)

pub mod code;
pub mod config;
pub mod error;
pub mod http;
pub mod limiter;
pub mod protocol;
pub mod reaper;
pub mod registry;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::{admin, state::HttpState};
use crate::limiter::Limiters;
use crate::protocol::{ws_handler, AppState};
use crate::registry::RoomRegistry;

/// 라우터 조립 — 어드민 라우트는 ADMIN_PASSWORD 설정 시에만 마운트
pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state.clone());

    if state.config.admin_password.is_some() {
        let http_state = HttpState::new(Arc::clone(&state.registry), Arc::clone(&state.config));
        let admin_router = Router::new()
            .route("/admin", get(admin::admin_page))
            .route("/admin/api/stats", get(admin::admin_stats))
            .route("/admin/api/rooms/{code}/close", post(admin::admin_close_room))
            .with_state(http_state);
        app = app.merge(admin_router);
    }

    app
}

pub async fn run_server(config: Config) {
    let config   = Arc::new(config);
    let registry = Arc::new(RoomRegistry::new(
        config.max_rooms_per_ip,
        config.max_pending_per_room,
    ));
    let limiters = Arc::new(Limiters::new());

    tokio::spawn(reaper::run_limiter_scavenger(Arc::clone(&limiters)));

    let app_state = AppState {
        config:   Arc::clone(&config),
        registry,
        limiters,
    };
    let app = build_router(app_state);

    let addr     = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.unwrap();

    info!("[mini-rendezvous] Signaling broker is running on ws://{}/ws", addr);
    if config.admin_password.is_some() {
        info!("[mini-rendezvous] Admin view enabled at http://{}/admin", addr);
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .unwrap();
}
