//! HTTP Server for the ElabLite API.
//!
//! # API Endpoints
//!
//! | Method | Path                | Description                                  |
//! |--------|---------------------|----------------------------------------------|
//! | GET    | `/health`           | Health check                                 |
//! | GET    | `/api/techniques`   | Technique catalog                            |
//! | POST   | `/api/techniques`   | Register a technique                         |
//! | POST   | `/api/template`     | Upload a template or preset (multipart)      |
//! | GET    | `/api/templates`    | Stored uploads (`?kind=templates\|presets`)  |
//! | POST   | `/api/form`         | Field layout and committed form values       |
//! | POST   | `/api/preset`       | Working set to `.elablite` bytes             |
//! | POST   | `/api/preset/read`  | `.elablite` upload to working set (multipart)|
//! | POST   | `/api/export`       | Session JSON + data files to zip (multipart) |
//! | GET    | `/api/logs`         | SSE stream for real-time logs                |
//! | GET    | `/api/logs/recent`  | Recent log entries                           |

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LogEntry, LOG_BROADCASTER};
use super::types::{
    error_response, ExportRequest, FormRequest, FormResponse, StoreQuery, TechniqueRequest, TemplateResponse,
};
use crate::cache::{StoredTemplate, TemplateStore};
use crate::error::{ServerError, SessionError, StoreError};
use crate::export::ZIP_MIME;
use crate::form::{self, DefaultRenderer};
use crate::models::{register_technique, techniques, TechniqueOption};
use crate::preset::{read_elablite, ELABLITE_MIME};
use crate::session::{Session, WorkingSet};
use crate::validation::ValidationState;

/// Upload size cap.
const BODY_LIMIT: usize = 512 * 1024 * 1024;

type ApiResult<T> = Result<T, ServerError>;

/// Shared server state
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<TemplateStore>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Session(SessionError::Store(StoreError::NotFound(_))) => StatusCode::NOT_FOUND,
            ServerError::Session(SessionError::Store(StoreError::InvalidName(_))) => StatusCode::BAD_REQUEST,
            ServerError::Session(SessionError::Store(StoreError::Io(_))) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Session(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        log_error(self.to_string());
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/techniques", get(list_techniques).post(add_technique))
        .route("/api/template", post(upload_template))
        .route("/api/templates", get(list_templates))
        .route("/api/form", post(form))
        .route("/api/preset", post(create_preset))
        .route("/api/preset/read", post(read_preset))
        .route("/api/export", post(export))
        .route("/api/logs", get(sse_logs))
        .route("/api/logs/recent", get(recent_logs))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, store: TemplateStore) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(AppState { store: Arc::new(store) });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 ElabLite server running on http://localhost:{}", port);
    println!("   POST /api/template - Upload template or preset");
    println!("   POST /api/form     - Generate form");
    println!("   POST /api/export   - Export zip");
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "elablite",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_techniques() -> Json<Vec<TechniqueOption>> {
    Json(techniques())
}

async fn add_technique(Json(request): Json<TechniqueRequest>) -> ApiResult<Json<TechniqueOption>> {
    let option = register_technique(&request.code, &request.french_name, &request.english_name)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    Ok(Json(option))
}

/// Upload part: file name and bytes.
struct Upload {
    name: String,
    bytes: Bytes,
}

/// Collect file parts, plus the text of the field named `text_field`.
async fn read_multipart(mut multipart: Multipart, text_field: &str) -> ApiResult<(Vec<Upload>, Option<String>)> {
    let mut uploads = Vec::new();
    let mut text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;

        if name == text_field && file_name.is_none() {
            text = Some(String::from_utf8_lossy(&bytes).into_owned());
        } else if let Some(file_name) = file_name {
            uploads.push(Upload { name: file_name, bytes });
        }
    }

    Ok((uploads, text))
}

async fn upload_template(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<TemplateResponse>> {
    let (uploads, _) = read_multipart(multipart, "").await?;
    let upload = uploads
        .into_iter()
        .next()
        .ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    log_info(format!("Template upload: {} ({} bytes)", upload.name, upload.bytes.len()));

    let mut session = Session::new();
    session.upload_template(&state.store, &upload.name, &upload.bytes)?;
    let response = TemplateResponse::from_session(&upload.name, &session)
        .ok_or_else(|| ServerError::Internal("Template not loaded".into()))?;
    Ok(Json(response))
}

async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<StoreQuery>,
) -> ApiResult<Json<Vec<StoredTemplate>>> {
    let listing = state.store.list(query.kind).map_err(SessionError::from)?;
    Ok(Json(listing))
}

async fn form(Json(request): Json<FormRequest>) -> ApiResult<Json<FormResponse>> {
    let mut form_data = request.form_data;
    let mut validation = ValidationState::default();
    let outcome = form::generate_form(
        &request.template_metadata,
        &mut form_data,
        &mut DefaultRenderer,
        &mut validation,
        request.disabled,
    )
    .map_err(SessionError::from)?;
    let invalid = validation.invalid_fields().map(str::to_string).collect();
    Ok(Json(FormResponse::new(outcome, form_data, invalid)))
}

fn download(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        bytes,
    )
        .into_response()
}

async fn create_preset(Json(working_set): Json<WorkingSet>) -> ApiResult<Response> {
    let mut session = Session::new();
    session.load_working_set(working_set)?;
    let (file_name, bytes) = session.save_preset()?;
    log_info(format!("Preset {} ({} bytes)", file_name, bytes.len()));
    Ok(download(ELABLITE_MIME, &file_name, bytes))
}

async fn read_preset(multipart: Multipart) -> ApiResult<Json<WorkingSet>> {
    let (uploads, _) = read_multipart(multipart, "").await?;
    let upload = uploads
        .into_iter()
        .next()
        .ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    let container = read_elablite(&upload.bytes).map_err(SessionError::from)?;
    Ok(Json(WorkingSet::from(container)))
}

async fn export(multipart: Multipart) -> ApiResult<Response> {
    let (uploads, session_json) = read_multipart(multipart, "session").await?;
    let session_json = session_json.ok_or_else(|| ServerError::BadRequest("Missing 'session' field".into()))?;
    let request: ExportRequest = serde_json::from_str(&session_json)
        .map_err(|e| ServerError::BadRequest(format!("Invalid session: {}", e)))?;

    let mut session = Session::new();
    session.load_working_set(request.working_set)?;
    session.set_grouped(request.grouped);

    let files = uploads.into_iter().map(|upload| (upload.name, upload.bytes.to_vec()));
    if request.match_files {
        session.attach_files(files)?;
    } else {
        session.add_uploads(files);
    }
    if let Some(columns) = &request.filename_columns {
        session.validate_filenames(columns)?;
    }

    let bundle = session.export(None)?;
    Ok(download(ZIP_MIME, &bundle.file_name, bundle.bytes))
}

/// SSE endpoint: recent history first, then live entries
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();
    let history = tokio_stream::iter(LOG_BROADCASTER.recent());
    let live = BroadcastStream::new(rx).filter_map(Result::ok);

    let stream = history.chain(live).filter_map(|entry: LogEntry| {
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn recent_logs() -> Json<Vec<LogEntry>> {
    Json(LOG_BROADCASTER.recent())
}
