//! Admin HTTP handlers
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::metrics::DispatchMetrics;

#[derive(Clone)]
pub struct AdminState {
    pub processor: String,
    pub watched_queue: String,
    pub metrics: Arc<DispatchMetrics>,
}

pub async fn health(State(state): State<AdminState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "processor": state.processor,
            "watching": state.watched_queue,
            "version": evproc_core::EVPROC_VERSION,
        })),
    )
}

pub async fn metrics(State(state): State<AdminState>) -> (StatusCode, String) {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
