//! Object storage access: listing a user's uploads and fetching their bytes.

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Url;
use serde_json::json;
use thiserror::Error;

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult};
use crate::selector::FileRecord;

const MAX_USER_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("storage returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Response(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Http(err.to_string())
    }
}

/// Storage backend used by the detection pipeline.
///
/// `list` returns full object paths in `FileRecord::name`, whether or not a
/// prefix was given.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn list(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<FileRecord>, StorageError>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Supabase Storage REST client.
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    list_limit: u32,
}

impl SupabaseStorage {
    pub fn new(config: &StorageConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("Invalid SUPABASE_URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "SUPABASE_URL is not a base URL: {}",
                config.base_url
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            list_limit: config.list_limit,
        })
    }

    fn object_url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Response("base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "object"])
            .extend(segments.iter().flat_map(|s| s.split('/')).filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl StorageClient for SupabaseStorage {
    async fn list(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<FileRecord>, StorageError> {
        let url = self.object_url(&["list", bucket])?;
        let folder = prefix.map(|p| p.trim_end_matches('/')).unwrap_or("");
        let body = json!({
            "prefix": folder,
            "limit": self.list_limit,
            "offset": 0,
            "sortBy": { "column": "created_at", "order": "desc" },
        });

        let response = self.authorized(self.client.post(url)).json(&body).send().await?;
        let response = Self::check_status(response).await?;
        let mut files: Vec<FileRecord> = response
            .json()
            .await
            .map_err(|e| StorageError::Response(e.to_string()))?;

        for file in &mut files {
            qualify_name(folder, &mut file.name);
        }
        Ok(files)
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url(&[bucket, path])?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Supabase reports names relative to the listed folder. Empty names stay
/// empty so the caller can tell them apart from real objects.
fn qualify_name(folder: &str, name: &mut Option<String>) {
    if let Some(name) = name.as_mut().filter(|n| !folder.is_empty() && !n.is_empty()) {
        *name = format!("{}/{}", folder, name);
    }
}

/// Check that a user id is safe to use as a literal folder prefix.
///
/// Allowed: ASCII alphanumerics plus `-`, `_`, `.` and `@`, at most 128 bytes,
/// and not a relative path component.
pub fn validate_user_id(user_id: &str) -> AppResult<()> {
    if user_id.is_empty() {
        return Err(AppError::InvalidInput("user_id must not be empty".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(AppError::InvalidInput(format!(
            "user_id longer than {} bytes",
            MAX_USER_ID_LEN
        )));
    }
    if user_id == "." || user_id == ".." {
        return Err(AppError::InvalidInput(format!("user_id {:?} is not allowed", user_id)));
    }
    if let Some(bad) = user_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@')))
    {
        return Err(AppError::InvalidInput(format!(
            "user_id contains forbidden character {:?}",
            bad
        )));
    }
    Ok(())
}

/// List a user's uploads.
///
/// Tries a listing scoped to the user's folder first. If that call fails the
/// whole bucket is listed and filtered by the literal `"{user_id}/"` prefix.
/// Only a failure of the scoped call triggers the fallback.
pub async fn list_user_files(
    storage: &dyn StorageClient,
    bucket: &str,
    user_id: &str,
) -> AppResult<Vec<FileRecord>> {
    validate_user_id(user_id)?;

    match storage.list(bucket, Some(user_id)).await {
        Ok(files) => Ok(files),
        Err(e) => {
            warn!(
                "Scoped listing of {}/{} failed ({}), falling back to full bucket listing",
                bucket, user_id, e
            );
            let prefix = format!("{}/", user_id);
            let files = storage.list(bucket, None).await?;
            let total = files.len();
            let matching: Vec<FileRecord> = files
                .into_iter()
                .filter(|f| f.name.as_deref().is_some_and(|n| n.starts_with(&prefix)))
                .collect();
            info!(
                "Fallback listing kept {} of {} object(s) under {}",
                matching.len(),
                total,
                prefix
            );
            Ok(matching)
        }
    }
}
