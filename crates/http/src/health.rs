//! Liveness, readiness and the combined legacy health probe.
//!
//! `/livez` never touches the store. `/readyz` and `/health` run the
//! readiness probe and answer with a fixed token either way; the underlying
//! error is only logged.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Router};

use bookshelf_kernel::ReadinessProbe;

pub const OK_TOKEN: &str = "OK";
pub const STORE_FAILURE_TOKEN: &str = "DB error";

pub type SharedProbe = Arc<dyn ReadinessProbe>;

/// Routes for `/livez`, `/readyz` and `/health`
pub fn routes(probe: SharedProbe) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .with_state(probe)
        .route("/livez", get(livez))
}

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, OK_TOKEN)
}

pub async fn readyz(State(probe): State<SharedProbe>) -> (StatusCode, &'static str) {
    check_store(probe.as_ref(), "readyz").await
}

pub async fn health(State(probe): State<SharedProbe>) -> (StatusCode, &'static str) {
    check_store(probe.as_ref(), "health").await
}

async fn check_store(
    probe: &dyn ReadinessProbe,
    endpoint: &'static str,
) -> (StatusCode, &'static str) {
    match probe.ready().await {
        Ok(()) => (StatusCode::OK, OK_TOKEN),
        Err(e) => {
            tracing::error!(endpoint, error = %format!("{e:#}"), "store check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, STORE_FAILURE_TOKEN)
        }
    }
}
