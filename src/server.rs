//! HTTP surface: router, shared state and handlers.
//!
//! ```text
//! GET  /health                 → 200 {ok:true}
//! POST /watermark/{operation}  → 200 application/pdf | 4xx/500 {ok:false, ...}
//! ```

use crate::config::ServerConfig;
use crate::error::WatermarkError;
use crate::pipeline::transform::Transformer;
use crate::watermark::watermark;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by every request. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub transformer: Arc<Transformer>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let transformer = Transformer::new(config.python_bin.clone(), config.transform_timeout);
        Self {
            config: Arc::new(config),
            transformer: Arc::new(transformer),
        }
    }
}

/// Build the application router.
pub fn router(config: ServerConfig) -> Router {
    let body_limit = config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/watermark/{operation}", post(watermark_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(config))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn watermark_handler(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, WatermarkError> {
    watermark(&state.config, &state.transformer, &operation, multipart).await
}
