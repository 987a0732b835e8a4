//! HTTP surface for the Stillframe thumbnail service.
//!
//! The interesting logic lives in `stillframe-core`; this crate wires it to
//! axum: bearer-token auth for the pipeline and operator principals, the
//! versioned route tree, and the error-to-status mapping.

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
