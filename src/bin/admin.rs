// author: kodeholic (powered by Claude)
//
// rvadmin — mini-rendezvous 운영 관리 CLI
//
// 사용법:
//   rvadmin [--host HOST] [--port PORT] --password PW <COMMAND>
//
// 조회 명령
//   rvadmin status          서버 상태 요약 (uptime, 방/피어 집계)
//   rvadmin rooms           방 전체 테이블
//
// 조작 명령
//   rvadmin close <code>    방 강제 파괴

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tabled::{Table, Tabled};

// ----------------------------------------------------------------------------
// [CLI 정의]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "rvadmin",
    about   = "mini-rendezvous 운영 관리 CLI",
    version,
)]
struct Cli {
    /// 서버 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 서버 포트 (WS/HTTP 공용)
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// 어드민 패스워드 (서버의 ADMIN_PASSWORD와 동일해야 함)
    #[arg(long)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 서버 상태 요약 (uptime, 방/피어 집계)
    Status,

    /// 방 전체 목록
    Rooms,

    /// 방 강제 파괴
    Close {
        /// 대상 랑데부 코드
        code: String,
    },
}

// ----------------------------------------------------------------------------
// [응답 타입] — http/dto.rs 와 대응
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct AdminStats {
    #[serde(rename = "totalRooms")]
    total_rooms:    usize,
    #[serde(rename = "totalPending")]
    total_pending:  usize,
    #[serde(rename = "totalApproved")]
    total_approved: usize,
    #[serde(rename = "uptimeSecs")]
    uptime_secs:    u64,
    rooms:          Vec<AdminRoomSummary>,
}

#[derive(Deserialize, Tabled)]
struct AdminRoomSummary {
    #[tabled(rename = "CODE")]
    code:           String,
    #[tabled(rename = "HOST")]
    host_live:      bool,
    #[tabled(rename = "PENDING")]
    pending_count:  usize,
    #[tabled(rename = "APPROVED")]
    approved_count: usize,
    #[tabled(rename = "AGE(s)")]
    age_seconds:    u64,
}

// ----------------------------------------------------------------------------
// [main]
// ----------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    let base = format!("http://{}:{}", cli.host, cli.port);

    let result = match &cli.command {
        Command::Status        => cmd_status(&base, &cli.password),
        Command::Rooms         => cmd_rooms(&base, &cli.password),
        Command::Close { code } => cmd_close(&base, &cli.password, code),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "ERROR:".red().bold(), e);
        std::process::exit(1);
    }
}

// ----------------------------------------------------------------------------
// [커맨드 구현]
// ----------------------------------------------------------------------------

fn cmd_status(base: &str, password: &str) -> Result<(), Box<dyn std::error::Error>> {
    let s: AdminStats = fetch_stats(base, password)?;

    let hours   = s.uptime_secs / 3600;
    let minutes = (s.uptime_secs % 3600) / 60;
    let secs    = s.uptime_secs % 60;

    println!();
    println!("{}", "  mini-rendezvous Broker Status".bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}",
        "Uptime:".bold(),
        format!("{}h {}m {}s", hours, minutes, secs).green()
    );
    println!("  {:16} {}", "Rooms:".bold(),    s.total_rooms.to_string().yellow());
    println!("  {:16} {}", "Pending:".bold(),  s.total_pending.to_string().yellow());
    println!("  {:16} {}", "Approved:".bold(), s.total_approved.to_string().yellow());
    println!();
    Ok(())
}

fn cmd_rooms(base: &str, password: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut rooms = fetch_stats(base, password)?.rooms;

    if rooms.is_empty() {
        println!("{}", "  개설된 방 없음".dimmed());
        return Ok(());
    }

    // 죽은 호스트 강조
    for room in &mut rooms {
        if !room.host_live {
            room.code = room.code.red().to_string();
        }
    }

    println!();
    println!("{}", Table::new(&rooms).to_string());
    println!("  {} room(s)", rooms.len());
    println!();
    Ok(())
}

fn cmd_close(base: &str, password: &str, code: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::blocking::Client::new();
    let resp   = client
        .post(api_url(base, &format!("/admin/api/rooms/{}/close", code), password))
        .send()?;
    let body   = check_api_response(resp)?;

    println!();
    println!("  {} code={}",
        "Room Closed".green().bold(),
        body["code"].as_str().unwrap_or(code).yellow(),
    );
    println!();
    Ok(())
}

// ----------------------------------------------------------------------------
// [공통 유틸] — 모든 호출이 password 쿼리를 달고 나간다
// ----------------------------------------------------------------------------

fn api_url(base: &str, path: &str, password: &str) -> String {
    format!("{}{}?password={}", base, path, password)
}

/// 어드민 API 응답 공통 처리 — 실패면 서버의 {error} 본문을 에러로 승격
fn check_api_response(
    resp: reqwest::blocking::Response,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        return Err(format!(
            "[{}] {}", status, body["error"].as_str().unwrap_or("unknown error")
        ).into());
    }
    Ok(body)
}

/// GET /admin/api/stats 역직렬화
fn fetch_stats(base: &str, password: &str) -> Result<AdminStats, Box<dyn std::error::Error>> {
    let resp = reqwest::blocking::get(api_url(base, "/admin/api/stats", password))?;
    let body = check_api_response(resp)?;
    Ok(serde_json::from_value(body)?)
}
