//! HTTP transport over the upload / resolve / download pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::VodError;
use crate::models::Overlay;
use crate::pdf::{RenderAssets, Renderer};
use crate::pipeline::{self, batch_archive_name, UploadResult};
use crate::settings::Settings;
use crate::store::{clean_name, Store};

pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

pub struct AppState {
    pub store: Store,
    pub renderer: Renderer,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl From<VodError> for AppError {
    fn from(e: VodError) -> Self {
        let status = match &e {
            VodError::NotFound(_) => StatusCode::NOT_FOUND,
            VodError::MalformedInput(_) | VodError::Unresolved(_) | VodError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("worker failed: {e}")))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/resolve", post(resolve))
        .route("/download/:filename", get(download))
        .route("/download-all", post(download_all))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub results: Vec<UploadResult>,
    pub total: usize,
    pub successful: usize,
    pub needs_review: usize,
}

impl UploadResponse {
    fn new(session_id: String, results: Vec<UploadResult>) -> Self {
        Self {
            session_id,
            total: results.len(),
            successful: results.iter().filter(|r| r.success).count(),
            needs_review: results.iter().filter(|r| r.needs_review()).count(),
            results,
        }
    }
}

/// POST /upload - multipart field `files`, one or more workbooks
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?;
        files.push((filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(AppError::bad_request("No files provided"));
    }
    if files.iter().all(|(name, _)| name.is_empty()) {
        return Err(AppError::bad_request("No files selected"));
    }

    let session = Store::new_session();
    info!(%session, files = files.len(), "upload received");
    let response = blocking(move || {
        let results = files
            .iter()
            .map(|(name, bytes)| {
                pipeline::process_upload(&state.store, &session, name, bytes, &state.renderer)
            })
            .collect();
        UploadResponse::new(session, results)
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub file_id: String,
    #[serde(default)]
    pub labels: Overlay,
}

/// POST /resolve - apply operator labels to a held upload and render it
async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<UploadResult>, AppError> {
    let result = blocking(move || {
        pipeline::resolve(&state.store, &req.file_id, &req.labels, &state.renderer)
    })
    .await??;
    Ok(Json(result))
}

fn attachment(name: &str, content_type: &'static str, bytes: Vec<u8>) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

/// GET /download/:filename
async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let name = filename.clone();
    let bytes = blocking(move || state.store.read_artifact(&name)).await??;
    Ok(attachment(clean_name(&filename), "application/pdf", bytes))
}

#[derive(Debug, Deserialize)]
pub struct DownloadAllRequest {
    #[serde(default)]
    pub files: Vec<String>,
}

/// POST /download-all - zip of the named artifacts
async fn download_all(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadAllRequest>,
) -> Result<Response, AppError> {
    if req.files.is_empty() {
        return Err(AppError::bad_request("No files specified"));
    }
    let archive = batch_archive_name(state.renderer.today());
    let bytes = blocking(move || state.store.bundle(&req.files)).await??;
    Ok(attachment(&archive, "application/zip", bytes))
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

pub async fn serve(settings: &Settings, port: u16) -> anyhow::Result<()> {
    let store = Store::from_settings(settings).context("failed to prepare data directory")?;
    let assets = RenderAssets::from_settings(settings).context("invalid render settings")?;
    let renderer = Renderer::new(assets).context("failed to load render assets")?;
    let state = Arc::new(AppState { store, renderer });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, data_dir = %settings.data_dir, "listening");
    axum::serve(listener, router(state)).await.context("server error")?;
    Ok(())
}
