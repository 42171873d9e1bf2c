//! Health check.

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::middleware::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "UP", "service": "blog-service" }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
