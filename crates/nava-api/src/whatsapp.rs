use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::warn;

use nava_types::api::{IngestMediaRequest, IngestMediaResponse};
use nava_types::models::MediaMessage;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};

pub const INGEST_KEY_HEADER: &str = "x-ingest-key";

/// Media log for one number, newest first.
pub async fn by_wa_number(
    State(state): State<AppState>,
    Path(wa_number): Path<String>,
) -> Result<Json<Vec<MediaMessage>>, ApiError> {
    let feed = state.feed.clone();
    let messages = run_blocking(move || Ok(feed.media_messages(&wa_number)?)).await?;
    Ok(Json(messages))
}

/// Webhook for inbound WhatsApp media.
pub async fn ingest_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<IngestMediaRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(expected) = state.ingest_key.as_deref() else {
        warn!("Media webhook called but NAVA_INGEST_KEY is not set");
        return Err(ApiError::Unauthorized("Ingestion is disabled".into()));
    };
    let presented = headers.get(INGEST_KEY_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        return Err(ApiError::Unauthorized("Invalid ingest key".into()));
    }

    let Json(req) = payload?;
    let feed = state.feed.clone();
    let (message_id, entry) = run_blocking(move || Ok(feed.ingest_media_message(&req)?)).await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestMediaResponse {
            success: true,
            message_id,
            entry,
        }),
    ))
}
