use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use tracing::error;

use super::{error::ApiError, origin::ClientOrigin, AppState};
use crate::audit::{AuditLogEntry, LogQuery};
use crate::distribute::Requester;
use crate::error::Result;
use crate::store::DocumentInfo;

#[derive(Serialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentInfo>,
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    /// Base64 encoded stamped PDF
    pub data: String,
    pub filename: String,
}

#[derive(Serialize)]
pub struct LogsResponse {
    pub entries: Vec<AuditLogEntry>,
    pub error: Option<String>,
}

/// Run filesystem and PDF work off the async runtime
async fn run_blocking<T, F>(work: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            error!("Blocking task failed: {}", e);
            Err(ApiError::Internal)
        }
    }
}

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<DocumentList>, ApiError> {
    let documents = run_blocking(move || state.distributor.store().list()).await?;

    Ok(Json(DocumentList { documents }))
}

pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(document): Path<String>,
    ClientOrigin(origin): ClientOrigin,
    payload: std::result::Result<Json<Requester>, JsonRejection>,
) -> std::result::Result<Json<DownloadResponse>, ApiError> {
    let Json(requester) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    let distribution =
        run_blocking(move || state.distributor.distribute(&document, &requester, origin)).await?;

    Ok(Json(DownloadResponse {
        success: true,
        data: STANDARD.encode(&distribution.bytes),
        filename: distribution.file_name,
    }))
}

pub async fn logs_handler(State(state): State<Arc<AppState>>, Query(query): Query<LogQuery>) -> Response {
    match run_blocking(move || state.distributor.audit().read_all()).await {
        Ok(entries) => Json(LogsResponse {
            entries: query.apply(entries),
            error: None,
        })
        .into_response(),
        Err(e) => (
            e.status(),
            Json(LogsResponse {
                entries: Vec::new(),
                error: Some("Failed to read download logs".to_string()),
            }),
        )
            .into_response(),
    }
}

pub async fn export_logs_handler(State(state): State<Arc<AppState>>) -> std::result::Result<Response, ApiError> {
    let file_name = state.distributor.audit().file_name();
    let raw = run_blocking(move || state.distributor.audit().export_raw()).await?;

    let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        raw,
    )
        .into_response())
}
