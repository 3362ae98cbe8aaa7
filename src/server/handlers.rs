//! 路由处理器
//!
//! 耗时或涉及磁盘/网络的操作 (启停流、写台账、写线配置) 放到 `web::block` 线程池执行。

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::counting::{normalize_key, Direction, LineRole};
use crate::error::CounterError;
use crate::session::LinePointOutcome;

// ========== 请求体 ==========

#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    #[serde(default)]
    pub rtsp_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDotRequest {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub numberplate: String,
    #[serde(default)]
    pub mode: Option<String>,
}

/// 计数点ID,接受数字或数字字符串
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DotIdField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct DotRequest {
    #[serde(default)]
    pub dot_id: Option<DotIdField>,
}

#[derive(Debug, Deserialize)]
pub struct LineNumberRequest {
    #[serde(default)]
    pub line_number: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinePointRequest {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub line_number: Option<i64>,
}

// ========== 响应辅助 ==========

fn success(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "success", "message": message.into() }))
}

fn failure(err: &CounterError) -> HttpResponse {
    warn!("⚠️ request rejected: {}", err);
    HttpResponse::Ok().json(json!({
        "status": "error",
        "message": err.to_string(),
        "kind": err.kind(),
    }))
}

fn parse_role(line_number: i64) -> Result<LineRole, CounterError> {
    LineRole::from_number(line_number).ok_or_else(|| {
        CounterError::invalid(format!("line_number must be 1 or 2, got {}", line_number))
    })
}

fn require_dot_id(body: &DotRequest) -> Result<u64, CounterError> {
    let id = match &body.dot_id {
        None => None,
        Some(DotIdField::Number(id)) => Some(*id),
        Some(DotIdField::Text(raw)) if raw.trim().is_empty() => None,
        Some(DotIdField::Text(raw)) => Some(raw.trim().parse::<u64>().map_err(|_| {
            CounterError::invalid(format!("dot_id must be an integer, got {:?}", raw))
        })?),
    };
    // 0 与缺省等价
    id.filter(|id| *id != 0)
        .ok_or_else(|| CounterError::invalid("Dot ID required"))
}

/// 请求体解析失败: 字段缺失/类型错误按校验错误返回 200;
/// JSON 语法错误、超长、Content-Type 不对返回 400,同样带错误结构
pub fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = err.to_string();
    warn!("⚠️ request body rejected: {}", message);
    let body = json!({
        "status": "error",
        "message": message,
        "kind": crate::error::ErrorKind::Validation,
    });

    let field_error = matches!(
        &err,
        JsonPayloadError::Deserialize(e) if e.classify() == serde_json::error::Category::Data
    );
    let response = if field_error {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::BadRequest().json(body)
    };
    InternalError::from_response(err, response).into()
}

// ========== 视频流 ==========

pub async fn start_stream(
    state: web::Data<AppState>,
    body: web::Json<StartStreamRequest>,
) -> Result<HttpResponse> {
    let stream = state.stream.clone();
    let url = body.into_inner().rtsp_url;
    match web::block(move || stream.start(&url)).await? {
        Ok(generation) => Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "message": "RTSP stream connected",
            "generation": generation,
        }))),
        Err(e) => Ok(failure(&e)),
    }
}

pub async fn stop_stream(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stream = state.stream.clone();
    web::block(move || stream.stop()).await?;
    Ok(success("Stream stopped"))
}

pub async fn stream_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.stream.status())
}

// ========== 计数点 ==========

pub async fn create_dot(
    state: web::Data<AppState>,
    body: web::Json<CreateDotRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    let mode = match body.mode.as_deref() {
        None => Direction::default(),
        Some(raw) => match raw.parse::<Direction>() {
            Ok(mode) => mode,
            Err(e) => return failure(&e),
        },
    };

    match state.session.create_dot(body.x, body.y, &body.numberplate, mode) {
        Ok(dot_id) => HttpResponse::Ok().json(json!({
            "status": "success",
            "dot_id": dot_id,
            "numberplate": normalize_key(&body.numberplate),
            "mode": mode,
        })),
        Err(e) => failure(&e),
    }
}

pub async fn finish_and_save(
    state: web::Data<AppState>,
    body: web::Json<DotRequest>,
) -> Result<HttpResponse> {
    let dot_id = match require_dot_id(&body) {
        Ok(id) => id,
        Err(e) => return Ok(failure(&e)),
    };

    let session = state.session.clone();
    match web::block(move || session.finish_dot(dot_id)).await? {
        Ok(finished) => Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "message": format!("{} saved to CSV", finished.numberplate),
            "data": finished,
        }))),
        Err(e) => Ok(failure(&e)),
    }
}

pub async fn remove_truck(
    state: web::Data<AppState>,
    body: web::Json<DotRequest>,
) -> HttpResponse {
    let result = require_dot_id(&body).and_then(|id| state.session.remove_dot(id));
    match result {
        Ok(numberplate) => success(format!("{} removed", numberplate)),
        Err(e) => failure(&e),
    }
}

pub async fn reset(state: web::Data<AppState>) -> HttpResponse {
    state.session.reset();
    success("Reset complete")
}

pub async fn get_counts(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.session.counts())
}

pub async fn get_tracks(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.session.tracks())
}

// ========== 边界线 ==========

pub async fn start_line_drawing(
    state: web::Data<AppState>,
    body: web::Json<LineNumberRequest>,
) -> HttpResponse {
    match parse_role(body.line_number.unwrap_or(1)) {
        Ok(role) => {
            state.session.start_line_drawing(role);
            success(format!("Click 2 points for Line {}", role.number()))
        }
        Err(e) => failure(&e),
    }
}

pub async fn add_line_point(
    state: web::Data<AppState>,
    body: web::Json<LinePointRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let role = match body.line_number.map(parse_role).transpose() {
        Ok(role) => role,
        Err(e) => return Ok(failure(&e)),
    };

    let session = state.session.clone();
    let outcome = web::block(move || session.add_line_point(body.x, body.y, role)).await?;
    Ok(match outcome {
        Ok(LinePointOutcome::NotDrawing) => HttpResponse::Ok().json(json!({
            "status": "added",
            "points": 0,
            "drawing": false,
        })),
        Ok(LinePointOutcome::Added(points)) => {
            HttpResponse::Ok().json(json!({ "status": "added", "points": points }))
        }
        Ok(LinePointOutcome::Complete { role, persisted }) => HttpResponse::Ok().json(json!({
            "status": "complete",
            "line_number": role.number(),
            "persisted": persisted,
        })),
        Err(e) => failure(&e),
    })
}

pub async fn delete_lines(state: web::Data<AppState>) -> Result<HttpResponse> {
    let session = state.session.clone();
    Ok(match web::block(move || session.clear_lines()).await? {
        Ok(()) => success("Lines deleted"),
        Err(e) => failure(&e),
    })
}

pub async fn get_line_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.session.line_status())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{test, App};
    use serde_json::Value;

    use super::*;
    use crate::config::CounterConfig;
    use crate::counting::{CsvLedger, LineStore};
    use crate::detection::TrackHistoryStore;
    use crate::input::scripted::ScriptedConnector;
    use crate::input::{StreamManager, StreamSettings};
    use crate::server::configure;
    use crate::session::Session;

    fn state(dir: &tempfile::TempDir) -> AppState {
        let config = CounterConfig::default();
        let ledger = CsvLedger::new(dir.path().join("counts.csv"));
        ledger.initialize().unwrap();
        let session = Arc::new(Session::new(
            LineStore::new(dir.path().join("line_config.json")),
            Box::new(ledger),
            TrackHistoryStore::new(30, 300, 4096),
            &config,
        ));
        let stream = Arc::new(StreamManager::new(
            session.clone(),
            Arc::new(ScriptedConnector::new(vec![vec![]])),
            StreamSettings {
                settle: Duration::ZERO,
                max_reconnect_attempts: 0,
                reconnect_delay: Duration::ZERO,
            },
        ));
        AppState::new(session, stream)
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(configure),
            )
            .await
        };
    }

    macro_rules! post {
        ($app:expr, $path:expr, $body:expr) => {{
            let req = test::TestRequest::post()
                .uri($path)
                .set_json($body)
                .to_request();
            let value: Value = test::call_and_read_body_json(&$app, req).await;
            value
        }};
    }

    macro_rules! get {
        ($app:expr, $path:expr) => {{
            let req = test::TestRequest::get().uri($path).to_request();
            let value: Value = test::call_and_read_body_json(&$app, req).await;
            value
        }};
    }

    #[actix_web::test]
    async fn test_dot_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(state(&dir));

        let created = post!(
            app,
            "/create_dot",
            json!({"x": 10, "y": 20, "numberplate": " ab12 ", "mode": "out"})
        );
        assert_eq!(created["status"], "success");
        assert_eq!(created["dot_id"], 1);
        assert_eq!(created["numberplate"], "AB12");
        assert_eq!(created["mode"], "OUT");

        let dup = post!(app, "/create_dot", json!({"x": 0, "y": 0, "numberplate": "AB12"}));
        assert_eq!(dup["status"], "error");
        assert_eq!(dup["message"], "AB12 already exists");
        assert_eq!(dup["kind"], "conflict");

        let counts = get!(app, "/get_counts");
        assert_eq!(counts["1"]["numberplate"], "AB12");
        assert_eq!(counts["1"]["IN"], 0);
        assert_eq!(counts["1"]["OUT"], 0);

        let saved = post!(app, "/finish_and_save", json!({"dot_id": 1}));
        assert_eq!(saved["status"], "success");
        assert_eq!(saved["message"], "AB12 saved to CSV");
        assert_eq!(saved["data"]["mode"], "OUT");

        let missing = post!(app, "/finish_and_save", json!({"dot_id": 1}));
        assert_eq!(missing["message"], "Truck not found");
        assert_eq!(missing["kind"], "not_found");

        let csv = std::fs::read_to_string(dir.path().join("counts.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[actix_web::test]
    async fn test_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(state(&dir));

        let empty = post!(app, "/create_dot", json!({"x": 0, "y": 0, "numberplate": "  "}));
        assert_eq!(empty["message"], "Number plate required");
        assert_eq!(empty["kind"], "validation");

        let bad_mode = post!(
            app,
            "/create_dot",
            json!({"x": 0, "y": 0, "numberplate": "X", "mode": "sideways"})
        );
        assert_eq!(bad_mode["kind"], "validation");

        let no_id = post!(app, "/remove_truck", json!({}));
        assert_eq!(no_id["message"], "Dot ID required");

        let bad_line = post!(app, "/start_line_drawing", json!({"line_number": 3}));
        assert_eq!(bad_line["status"], "error");

        let bad_url = post!(app, "/start_stream", json!({"rtsp_url": "http://cam"}));
        assert_eq!(bad_url["message"], "URL must start with rtsp://");
    }

    #[actix_web::test]
    async fn test_line_drawing_flow() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(state(&dir));

        let idle = post!(app, "/add_line_point", json!({"x": 1, "y": 1}));
        assert_eq!(idle["status"], "added");
        assert_eq!(idle["points"], 0);

        let started = post!(app, "/start_line_drawing", json!({"line_number": 2}));
        assert_eq!(started["message"], "Click 2 points for Line 2");
        let first = post!(app, "/add_line_point", json!({"x": 0, "y": 50, "line_number": 2}));
        assert_eq!(first["points"], 1);
        let done = post!(app, "/add_line_point", json!({"x": 100, "y": 50, "line_number": 2}));
        assert_eq!(done["status"], "complete");
        assert_eq!(done["line_number"], 2);
        assert_eq!(done["persisted"], false);

        let status = get!(app, "/get_line_status");
        assert_eq!(status["line_one_drawn"], false);
        assert_eq!(status["line_two_drawn"], true);

        post!(app, "/start_line_drawing", json!({}));
        post!(app, "/add_line_point", json!({"x": 0, "y": 0}));
        let done = post!(app, "/add_line_point", json!({"x": 100, "y": 0}));
        assert_eq!(done["line_number"], 1);
        assert_eq!(done["persisted"], true);
        assert!(dir.path().join("line_config.json").exists());

        let deleted = post!(app, "/delete_lines", json!({}));
        assert_eq!(deleted["message"], "Lines deleted");
        let status = get!(app, "/get_line_status");
        assert_eq!(status["line_one_drawn"], false);
        assert!(!dir.path().join("line_config.json").exists());
    }

    #[actix_web::test]
    async fn test_stream_start_stop_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(state(&dir));

        let started = post!(app, "/start_stream", json!({"rtsp_url": "rtsp://cam/1"}));
        assert_eq!(started["status"], "success");
        let status = get!(app, "/stream_status");
        assert_eq!(status["source"], "rtsp://cam/1");

        let stopped = post!(app, "/stop_stream", json!({}));
        assert_eq!(stopped["message"], "Stream stopped");
        let status = get!(app, "/stream_status");
        assert_eq!(status["running"], false);

        // 没有流时停止也成功
        let stopped = post!(app, "/stop_stream", json!({}));
        assert_eq!(stopped["status"], "success");

        post!(app, "/create_dot", json!({"x": 0, "y": 0, "numberplate": "A"}));
        let reset = post!(app, "/reset", json!({}));
        assert_eq!(reset["message"], "Reset complete");
        assert_eq!(get!(app, "/get_counts"), json!({}));
        assert_eq!(get!(app, "/get_tracks"), json!([]));
    }

    #[actix_web::test]
    async fn test_bad_fields_return_validation_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(state(&dir));

        let wrong_type = post!(app, "/create_dot", json!({"x": "abc", "y": 1, "numberplate": "A"}));
        assert_eq!(wrong_type["status"], "error");
        assert_eq!(wrong_type["kind"], "validation");

        let missing = post!(app, "/create_dot", json!({"y": 1, "numberplate": "A"}));
        assert_eq!(missing["status"], "error");
        assert_eq!(missing["kind"], "validation");
        assert!(missing["message"].as_str().unwrap().contains("x"));

        let point = post!(app, "/add_line_point", json!({"x": 1}));
        assert_eq!(point["kind"], "validation");

        let negative = post!(app, "/finish_and_save", json!({"dot_id": -1}));
        assert_eq!(negative["kind"], "validation");

        // 未创建任何计数点
        assert_eq!(get!(app, "/get_counts"), json!({}));
    }

    #[actix_web::test]
    async fn test_malformed_json_is_400_with_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(state(&dir));

        let req = test::TestRequest::post()
            .uri("/create_dot")
            .insert_header(actix_web::http::header::ContentType::json())
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "validation");
    }

    #[actix_web::test]
    async fn test_dot_id_accepts_numeric_string() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(state(&dir));

        for plate in ["A", "B", "C"] {
            post!(app, "/create_dot", json!({"x": 0, "y": 0, "numberplate": plate}));
        }

        let removed = post!(app, "/remove_truck", json!({"dot_id": "3"}));
        assert_eq!(removed["status"], "success");
        assert_eq!(removed["message"], "C removed");

        let saved = post!(app, "/finish_and_save", json!({"dot_id": " 1 "}));
        assert_eq!(saved["message"], "A saved to CSV");

        let junk = post!(app, "/remove_truck", json!({"dot_id": "two"}));
        assert_eq!(junk["kind"], "validation");

        let empty = post!(app, "/remove_truck", json!({"dot_id": ""}));
        assert_eq!(empty["message"], "Dot ID required");

        let counts = get!(app, "/get_counts");
        assert_eq!(counts.as_object().unwrap().len(), 1);
        assert_eq!(counts["2"]["numberplate"], "B");
    }
}
