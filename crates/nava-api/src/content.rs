use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use nava_types::api::{
    Claims, DeletedResponse, EntriesResponse, EntryResponse, MetricsResponse, UpdateEntryRequest,
    UploadRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, parse_path_id, run_blocking};

pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    debug!("User {} uploading for {}", claims.sub, req.phone_number);

    let feed = state.feed.clone();
    let entry = run_blocking(move || Ok(feed.create_web_entry(&req)?)).await?;

    Ok((StatusCode::CREATED, Json(EntryResponse { success: true, entry })))
}

pub async fn by_phone(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let feed = state.feed.clone();
    let entries = run_blocking(move || Ok(feed.list_by_phone(&phone_number)?)).await?;
    Ok(Json(EntriesResponse { success: true, entries }))
}

pub async fn all(State(state): State<AppState>) -> Result<Json<EntriesResponse>, ApiError> {
    let feed = state.feed.clone();
    let entries = run_blocking(move || Ok(feed.list_all()?)).await?;
    Ok(Json(EntriesResponse { success: true, entries }))
}

pub async fn approved(State(state): State<AppState>) -> Result<Json<EntriesResponse>, ApiError> {
    let feed = state.feed.clone();
    let entries = run_blocking(move || Ok(feed.list_approved()?)).await?;
    Ok(Json(EntriesResponse { success: true, entries }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    let feed = state.feed.clone();
    let metrics = run_blocking(move || Ok(feed.metrics()?)).await?;
    Ok(Json(MetricsResponse { success: true, metrics }))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    let id = parse_path_id(&id)?;
    let Json(req) = payload?;
    debug!("User {} updating entry {}", claims.sub, id);

    let feed = state.feed.clone();
    let entry = run_blocking(move || Ok(feed.update_entry(id, &req)?)).await?;
    Ok(Json(EntryResponse { success: true, entry }))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = parse_path_id(&id)?;
    debug!("User {} deleting entry {}", claims.sub, id);

    let feed = state.feed.clone();
    run_blocking(move || Ok(feed.delete_entry(id)?)).await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: "Entry deleted successfully".into(),
    }))
}
