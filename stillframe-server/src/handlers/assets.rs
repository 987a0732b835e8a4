//! Pipeline-facing asset routes: creation, lookup, status ingest, and the
//! rendering service's result writeback.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use stillframe_core::asset::{Asset, AssetId, NewAsset, StatusReport};
use stillframe_core::ingest::IngestOutcome;

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

pub async fn create_asset(
    State(state): State<AppState>,
    Json(body): Json<NewAsset>,
) -> AppResult<(StatusCode, Json<Asset>)> {
    let asset = state.store.create(body).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Asset>> {
    let id = AssetId(id);
    let asset = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("asset not found: {id}")))?;
    Ok(Json(asset))
}

/// Status ingest: one atomic mutation, possibly firing a dispatch. The
/// response tells the reporter whether this report fired and whether the
/// intent made it onto the queue.
pub async fn report_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(report): Json<StatusReport>,
) -> AppResult<Json<IngestOutcome>> {
    let outcome = state.ingest.report(AssetId(id), report).await?;
    Ok(Json(outcome))
}

/// Success/failure report from the rendering service.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderResultBody {
    pub success: bool,
    pub thumbnail_url: Option<String>,
    pub thumbnail_blur_url: Option<String>,
    pub error: Option<String>,
}

pub async fn report_render_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RenderResultBody>,
) -> AppResult<Json<Asset>> {
    let id = AssetId(id);
    let asset = if body.success {
        let thumbnail_url = body
            .thumbnail_url
            .as_deref()
            .ok_or_else(|| AppError::bad_request("success report requires thumbnail_url"))?;
        state
            .store
            .complete_generation(id, thumbnail_url, body.thumbnail_blur_url.as_deref())
            .await?
    } else {
        let error = body.error.as_deref().unwrap_or("rendering failed");
        state.store.mark_generation_failed(id, error).await?
    };
    Ok(Json(asset))
}
