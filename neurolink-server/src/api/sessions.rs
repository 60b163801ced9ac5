//! Admin endpoints over persisted session headers and their samples

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use neurolink_common::db::{Measurement, SessionHeader};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// UTF-8 byte order mark; lets spreadsheet tools detect the encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const CSV_HEADER: [&str; 8] = [
    "Time (s)",
    "Emotion",
    "AI Score",
    "Engagement",
    "Satisfaction",
    "Trust",
    "Loyalty",
    "Opinion",
];

/// GET /sessions/:id response
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub info: SessionHeader,
    pub data: Vec<Measurement>,
}

/// POST /sessions/bulk-delete request
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}

/// POST /sessions/bulk-delete response
#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

/// GET /sessions - all headers, newest first
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<SessionHeader>>> {
    Ok(Json(state.store.list_session_headers().await?))
}

/// GET /sessions/:id - header plus samples ordered by session time
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SessionDetail>> {
    let info = state
        .store
        .get_session_header(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))?;
    let data = state.store.list_measurements(id).await?;

    Ok(Json(SessionDetail { info, data }))
}

/// DELETE /sessions/:id - header and samples; a missing id still succeeds
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    state.store.delete_session_header(id).await?;
    info!("Deleted session {}", id);
    Ok(Json(json!({ "message": format!("Session {} deleted", id) })))
}

/// POST /sessions/bulk-delete
pub async fn bulk_delete_sessions(
    State(state): State<AppState>,
    Json(request): Json<BulkDeleteRequest>,
) -> ApiResult<Json<BulkDeleteResponse>> {
    if request.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".to_string()));
    }

    let deleted = state.store.delete_session_headers(&request.ids).await?;
    info!("Bulk-deleted {} of {} requested sessions", deleted, request.ids.len());
    Ok(Json(BulkDeleteResponse { deleted }))
}

/// GET /sessions/:id/export.csv - semicolon-separated report
pub async fn export_session_csv(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let info = state
        .store
        .get_session_header(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))?;
    let data = state.store.list_measurements(id).await?;

    let body = render_csv(&data)?;
    let disposition = format!("attachment; filename=\"{}\"", report_file_name(&info));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Score with a decimal comma, as expected by European spreadsheet locales
fn format_score(score: f64) -> String {
    format!("{}", score).replace('.', ",")
}

/// Render samples as a BOM-prefixed, `;`-separated CSV document
pub fn render_csv(measurements: &[Measurement]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(UTF8_BOM.to_vec());

    let csv_err = |e: csv::Error| ApiError::Internal(format!("CSV export failed: {}", e));

    writer.write_record(CSV_HEADER).map_err(csv_err)?;
    for m in measurements {
        writer
            .write_record([
                m.session_time.to_string(),
                m.emotion.clone(),
                format_score(m.emotion_score),
                m.engagement_val.to_string(),
                m.satisfaction_val.to_string(),
                m.trust_val.to_string(),
                m.loyalty_val.to_string(),
                m.opinion_val.to_string(),
            ])
            .map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("CSV export failed: {}", e)))
}

fn report_file_name(info: &SessionHeader) -> String {
    let part = |s: &Option<String>| -> String {
        s.as_deref()
            .unwrap_or("")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect()
    };
    format!(
        "report_{}_{}_{}.csv",
        part(&info.first_name),
        part(&info.last_name),
        chrono::Utc::now().format("%Y-%m-%d")
    )
}

/// Build admin session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/bulk-delete", post(bulk_delete_sessions))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/export.csv", get(export_session_csv))
}
