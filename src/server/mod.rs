/// 控制面 HTTP 服务 (Control API)
///
/// 所有请求体/响应体都是 JSON; 业务错误以 `{"status": "error"}` 返回,
/// HTTP 状态码保持 200,只有 JSON 语法错误返回 400 (同样带错误结构)。
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use tracing::info;

use crate::input::StreamManager;
use crate::session::Session;

pub mod handlers;

/// 处理器共享的状态
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub stream: Arc<StreamManager>,
}

impl AppState {
    pub fn new(session: Arc<Session>, stream: Arc<StreamManager>) -> Self {
        Self { session, stream }
    }
}

/// 注册全部路由
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error))
        .route("/start_stream", web::post().to(handlers::start_stream))
        .route("/stop_stream", web::post().to(handlers::stop_stream))
        .route("/create_dot", web::post().to(handlers::create_dot))
        .route("/finish_and_save", web::post().to(handlers::finish_and_save))
        .route("/remove_truck", web::post().to(handlers::remove_truck))
        .route("/start_line_drawing", web::post().to(handlers::start_line_drawing))
        .route("/add_line_point", web::post().to(handlers::add_line_point))
        .route("/delete_lines", web::post().to(handlers::delete_lines))
        .route("/reset", web::post().to(handlers::reset))
        .route("/get_counts", web::get().to(handlers::get_counts))
        .route("/get_line_status", web::get().to(handlers::get_line_status))
        .route("/get_tracks", web::get().to(handlers::get_tracks))
        .route("/stream_status", web::get().to(handlers::stream_status));
}

/// 启动 HTTP 服务,直到收到退出信号
pub async fn run(bind: &str, state: AppState) -> std::io::Result<()> {
    let data = web::Data::new(state);
    info!("🌐 Control API listening on http://{}", bind);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .bind(bind)?
    .run()
    .await
}
