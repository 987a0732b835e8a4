//! Bearer-token authentication.
//!
//! Two static tokens map onto the two service principals: the upstream
//! pipeline (status reports) and the maintenance operator. The middleware
//! resolves the token to a [`Principal`] and stores it in request extensions;
//! permission checks happen per route group.

use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use constant_time_eq::constant_time_eq;

use stillframe_core::access::{Principal, permissions};

use crate::errors::AppError;
use crate::infra::app_state::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request)?;
    let principal = resolve_principal(&state, &token)
        .ok_or_else(|| AppError::unauthorized("unknown bearer token"))?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn extract_bearer_token(request: &Request) -> Result<String, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("missing authorization header"))?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) => Ok(token.to_string()),
        None => Err(AppError::unauthorized("malformed authorization header")),
    }
}

fn resolve_principal(state: &AppState, token: &str) -> Option<Principal> {
    let tokens = &state.settings.auth;
    if token_matches(tokens.pipeline_token.as_deref(), token) {
        return Some(pipeline_principal());
    }
    if token_matches(tokens.operator_token.as_deref(), token) {
        return Some(operator_principal());
    }
    None
}

/// Constant-time comparison of a presented token against a configured secret.
fn token_matches(configured: Option<&str>, presented: &str) -> bool {
    let Some(configured) = configured else {
        return false;
    };
    if configured.len() != presented.len() {
        return false;
    }
    constant_time_eq(configured.as_bytes(), presented.as_bytes())
}

pub fn pipeline_principal() -> Principal {
    Principal::new("stillframe-pipeline").grant(permissions::PIPELINE_REPORT)
}

pub fn operator_principal() -> Principal {
    Principal::new("stillframe-operator")
        .grant(permissions::MAINTENANCE_VIEW)
        .grant(permissions::MAINTENANCE_BACKFILL)
}

/// Route-group layer checking one permission on the principal set by
/// [`auth_middleware`]. Runs after it in the stack.
pub fn require_permission(
    permission: &'static str,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
+ Clone
+ Send
+ Sync
+ 'static {
    move |request: Request, next: Next| Box::pin(check_permission(request, next, permission))
}

async fn check_permission(request: Request, next: Next, permission: &str) -> Response {
    let Some(principal) = request.extensions().get::<Principal>() else {
        return AppError::unauthorized("authentication required").into_response();
    };
    if !principal.has_permission(permission) {
        return AppError::forbidden(format!("permission '{permission}' required"))
            .into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_token_matches() {
        assert!(token_matches(Some("render-secret"), "render-secret"));
    }

    #[test]
    fn equal_length_near_miss_is_rejected() {
        assert!(!token_matches(Some("render-secret"), "render-secreX"));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(!token_matches(Some("render-secret"), "render"));
        assert!(!token_matches(Some("render-secret"), "render-secret-extra"));
    }

    #[test]
    fn unconfigured_token_never_matches() {
        assert!(!token_matches(None, "render-secret"));
        assert!(!token_matches(None, ""));
    }
}
