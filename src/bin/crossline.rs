/// 双线越线计数服务
/// RTSP two-line crossing counter service
///
/// 主程序入口 - 直接运行: cargo run --bin crossline --release
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

use crossline_rs::server::{self, AppState};
use crossline_rs::{Args, CounterConfig, Session, SidecarConnector, StreamManager, StreamSettings};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_LOG_FILTER: &str = "crossline_rs=info,crossline=info,actix_web=info";

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --log-filter > RUST_LOG > 默认
    let filter = match &args.log_filter {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("无效的日志过滤: {}", directives))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = CounterConfig::load(&args.config);

    println!("{}", "=".repeat(60));
    println!("🚀 RTSP Live Stream Package Counter");
    println!("{}", "=".repeat(60));
    println!("📊 CSV: {}", config.ledger_file.display());
    println!("📏 Lines: {}", config.line_config_file.display());
    println!("🌐 Control API: http://{}", args.bind);
    println!("{}", "=".repeat(60));
    config.print_summary();

    // ========== 计数会话 ==========
    let session = Arc::new(Session::from_config(&config).context("初始化计数会话失败")?);

    // ========== 检测输入 ==========
    let connector = Arc::new(SidecarConnector::new(
        config.detector_addr.clone(),
        config.read_timeout(),
    ));
    let stream = Arc::new(StreamManager::new(
        session.clone(),
        connector,
        StreamSettings::from(&config),
    ));

    // ========== 控制面 ==========
    let served = server::run(&args.bind, AppState::new(session, stream.clone())).await;

    // 退出前释放视频流
    stream.stop();

    served.with_context(|| format!("HTTP 服务异常退出 ({})", args.bind))
}
