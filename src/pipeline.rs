//! Request flow: list → select → download → decode → detect → reduce.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::ai::Detector;
use crate::errors::{AppError, AppResult};
use crate::reducer::{self, Ingredient, CONFIDENCE_THRESHOLD};
use crate::storage::{self, StorageClient};
use crate::{imaging, selector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub file: String,
    pub ingredients: Vec<Ingredient>,
}

/// Detect ingredients in the newest upload of `user_id` in `bucket`.
pub async fn detect_latest(
    storage: &dyn StorageClient,
    detector: Arc<dyn Detector>,
    bucket: &str,
    user_id: &str,
) -> AppResult<DetectionReport> {
    let started = Instant::now();

    let files = storage::list_user_files(storage, bucket, user_id).await?;
    let latest = selector::select_latest(files).ok_or_else(|| AppError::NotFound {
        user_id: user_id.to_string(),
        bucket: bucket.to_string(),
    })?;
    let file_name = latest
        .name
        .filter(|n| !n.is_empty())
        .ok_or(AppError::MissingFileName)?;

    let bytes = storage
        .download(bucket, &file_name)
        .await
        .map_err(|e| AppError::Download(e.to_string()))?;
    log::debug!("Downloaded {} ({} bytes)", file_name, bytes.len());

    let ingredients = tokio::task::spawn_blocking(move || -> AppResult<Vec<Ingredient>> {
        let image = imaging::decode(&bytes)?;
        drop(bytes);
        let raw = detector.detect(&image)?;
        Ok(reducer::reduce(&raw, CONFIDENCE_THRESHOLD))
    })
    .await
    .map_err(|e| AppError::Inference(format!("Detection task failed: {}", e)))??;

    log::info!(
        "Detected {} ingredient(s) in {} for user {} in {:?}",
        ingredients.len(),
        file_name,
        user_id,
        started.elapsed()
    );

    Ok(DetectionReport {
        file: file_name,
        ingredients,
    })
}
