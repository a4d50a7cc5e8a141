use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::ai::DetectorService;
use crate::errors::{AppError, AppResult};
use crate::pipeline::{self, DetectionReport};
use crate::storage::StorageClient;

pub struct AppState {
    pub storage: Arc<dyn StorageClient>,
    pub detector: Arc<DetectorService>,
    pub default_bucket: String,
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub user_id: String,
    #[serde(default)]
    pub bucket: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/detect", post(detect_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn detect_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DetectRequest>,
) -> AppResult<Json<DetectionReport>> {
    let bucket = req
        .bucket
        .unwrap_or_else(|| state.default_bucket.clone());
    if bucket.trim().is_empty() || bucket.contains('/') {
        return Err(AppError::InvalidInput(format!("invalid bucket name {:?}", bucket)));
    }

    log::info!("Detect request for user {} in bucket {}", req.user_id, bucket);
    let detector = state.detector.detector()?;
    let report =
        pipeline::detect_latest(state.storage.as_ref(), detector, &bucket, &req.user_id).await?;
    Ok(Json(report))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let model = if state.detector.is_ready() {
        "ready"
    } else {
        "uninitialized"
    };
    Json(json!({ "status": "ok", "model": model }))
}

/// Serve until `cancel` fires.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    log::info!("Server stopped");
    Ok(())
}
