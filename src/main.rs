// author: kodeholic (powered by Claude)

use clap::Parser;
use mini_rendezvous::{config::Config, run_server};

/// mini-rendezvous 시그널링 브로커 서버
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// 시그널링 포트 (환경변수 PORT보다 우선)
    #[arg(long)]
    pub port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // 환경 변수 기반 로깅 초기화 (RUST_LOG=trace 등으로 제어)
    // 로컬 시각 타이머 — chrono::Local 기반
    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // 설정: 환경변수 우선 로드 후 CLI 인자로 덮어쓰기
    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }

    run_server(config).await;
}
