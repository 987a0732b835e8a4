//! Operator routes: the stuck-job view and backfill.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use uuid::Uuid;

use stillframe_core::access::Principal;
use stillframe_core::asset::AssetId;
use stillframe_core::backfill::{BackfillReport, BatchBackfillReport};
use stillframe_core::recovery::StuckJob;

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

pub async fn stuck_thumbnails(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Vec<StuckJob>>> {
    let stuck = state.scanner.stuck_jobs(&principal).await?;
    Ok(Json(stuck))
}

pub async fn backfill_one(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BackfillReport>> {
    let report = state.backfill.trigger_one(&principal, AssetId(id)).await?;
    Ok(Json(report))
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BatchBackfillBody {
    #[serde(default = "default_batch_limit")]
    pub limit: i64,
}

fn default_batch_limit() -> i64 {
    10
}

pub async fn backfill_batch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<BatchBackfillBody>,
) -> AppResult<Json<BatchBackfillReport>> {
    let batch = state
        .backfill
        .trigger_batch(&principal, body.limit)
        .await?;
    Ok(Json(batch))
}
