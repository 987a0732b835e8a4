use axum::{
    Router, middleware,
    routing::{get, post},
};

use stillframe_core::access::permissions;

use crate::handlers::{assets, maintenance};
use crate::infra::app_state::AppState;
use crate::infra::auth;

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(create_pipeline_routes(state.clone()))
        .merge(create_maintenance_routes(state))
}

/// Routes the upstream pipeline reports into.
fn create_pipeline_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/assets", post(assets::create_asset))
        .route("/assets/{id}", get(assets::get_asset))
        .route("/assets/{id}/status", post(assets::report_status))
        .route(
            "/assets/{id}/render-result",
            post(assets::report_render_result),
        )
        // Layers run outermost-last: authentication first, then the
        // permission check against the resolved principal.
        .route_layer(middleware::from_fn(auth::require_permission(
            permissions::PIPELINE_REPORT,
        )))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::auth_middleware,
        ))
}

/// Operator-facing maintenance routes.
fn create_maintenance_routes(state: AppState) -> Router<AppState> {
    let stuck = Router::new()
        .route(
            "/maintenance/thumbnails/stuck",
            get(maintenance::stuck_thumbnails),
        )
        .route_layer(middleware::from_fn(auth::require_permission(
            permissions::MAINTENANCE_VIEW,
        )));

    let backfill = Router::new()
        .route(
            "/maintenance/thumbnails/backfill/{id}",
            post(maintenance::backfill_one),
        )
        .route(
            "/maintenance/thumbnails/backfill",
            post(maintenance::backfill_batch),
        )
        .route_layer(middleware::from_fn(auth::require_permission(
            permissions::MAINTENANCE_BACKFILL,
        )));

    stuck
        .merge(backfill)
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::auth_middleware,
        ))
}
