use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::errors::{AppError, AppResult};

pub mod object_detection;

use object_detection::{FasterRcnnDetector, RawDetection};

/// Anything smaller than this is an error page or a truncated transfer.
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// Maps one decoded image to every raw proposal the model produces.
///
/// Implementations must be deterministic and safe to call from many threads.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> AppResult<Vec<RawDetection>>;
}

pub enum ModelState {
    Uninitialized,
    Ready(Arc<dyn Detector>),
}

/// Owns the process-wide detector. Built once at startup and shared with
/// every request handler; never mutated after `load`.
pub struct DetectorService {
    state: ModelState,
}

impl DetectorService {
    pub fn new() -> Self {
        Self {
            state: ModelState::Uninitialized,
        }
    }

    pub fn with_detector(detector: Arc<dyn Detector>) -> Self {
        Self {
            state: ModelState::Ready(detector),
        }
    }

    /// Load the ONNX model from disk. A second call on a ready service is a no-op.
    pub fn load(&mut self, config: &ModelConfig) -> AppResult<()> {
        if self.is_ready() {
            return Ok(());
        }

        let detector = FasterRcnnDetector::load(&config.model_path(), config.input_size)?;
        self.state = ModelState::Ready(Arc::new(detector));
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn detector(&self) -> AppResult<Arc<dyn Detector>> {
        match &self.state {
            ModelState::Ready(detector) => Ok(detector.clone()),
            ModelState::Uninitialized => Err(AppError::ModelUnavailable(
                "detector has not been loaded".to_string(),
            )),
        }
    }
}

/// Make sure the model file exists locally, downloading it when a URL is configured.
pub async fn ensure_model_file(config: &ModelConfig) -> AppResult<PathBuf> {
    let model_path = config.model_path();
    if model_path.exists() {
        log::info!("Detection model found at {:?}", model_path);
        return Ok(model_path);
    }

    let url = config.model_url.as_deref().ok_or_else(|| {
        AppError::Config(format!(
            "Detection model not found at {:?} and FRIDGE_MODEL_URL is not set",
            model_path
        ))
    })?;

    tokio::fs::create_dir_all(&config.models_dir)
        .await
        .map_err(|e| AppError::Io(format!("Failed to create models dir: {}", e)))?;

    log::info!("Downloading detection model from {}", url);
    let client = reqwest::Client::new();
    download_from_url(&client, url, &model_path).await?;
    log::info!("Detection model download complete");

    Ok(model_path)
}

async fn download_from_url(
    client: &reqwest::Client,
    url: &str,
    model_path: &Path,
) -> AppResult<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Download(format!("Model request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Download(format!(
            "Model download failed with status {}",
            response.status()
        )));
    }

    let total_size = response.content_length();
    let mut downloaded: u64 = 0;
    let temp_path = model_path.with_extension("tmp");

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(|e| AppError::Io(format!("Failed to create file: {}", e)))?;
    let mut stream = response.bytes_stream();
    let mut next_report: u64 = 10 * 1024 * 1024;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(AppError::Download(format!("Download stream error: {}", e)));
            }
        };
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if downloaded >= next_report {
            log::info!(
                "Downloading detection model: {}/{} bytes",
                downloaded,
                total_size.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string())
            );
            next_report += 10 * 1024 * 1024;
        }
    }
    file.flush().await?;
    drop(file);

    if downloaded < MIN_MODEL_BYTES {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(AppError::Download(format!(
            "Downloaded file too small ({} bytes), refusing to use it",
            downloaded
        )));
    }

    tokio::fs::rename(&temp_path, model_path)
        .await
        .map_err(|e| AppError::Io(format!("Failed to rename file: {}", e)))?;
    Ok(())
}
