//! Environment-driven service configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

const APP_DATA_DIR_NAME: &str = "fridge-vision";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8001";
const DEFAULT_MODEL_FILE: &str = "fasterrcnn_resnet50_fpn.onnx";
const DEFAULT_INPUT_SIZE: u32 = 800;
const DEFAULT_LIST_LIMIT: u32 = 100;
const DEFAULT_BUCKET: &str = "fridge-images";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_url: String,
    pub api_key: String,
    pub list_limit: u32,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    pub model_file: String,
    pub model_url: Option<String>,
    pub input_size: u32,
}

impl ModelConfig {
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_file)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub default_bucket: String,
    pub storage: StorageConfig,
    pub model: ModelConfig,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = get("SUPABASE_URL")
            .ok_or_else(|| AppError::Config("SUPABASE_URL must be set".to_string()))?;
        let api_key = get("SUPABASE_KEY")
            .ok_or_else(|| AppError::Config("SUPABASE_KEY must be set".to_string()))?;

        let bind_addr = get("FRIDGE_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("Invalid FRIDGE_BIND_ADDR: {}", e)))?;

        let models_dir = match get("FRIDGE_MODELS_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_models_dir()?,
        };

        Ok(Self {
            bind_addr,
            default_bucket: get("FRIDGE_DEFAULT_BUCKET")
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            storage: StorageConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                list_limit: parse_number(
                    get("FRIDGE_LIST_LIMIT"),
                    "FRIDGE_LIST_LIMIT",
                    DEFAULT_LIST_LIMIT,
                )?,
            },
            model: ModelConfig {
                models_dir,
                model_file: get("FRIDGE_MODEL_FILE")
                    .unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string()),
                model_url: get("FRIDGE_MODEL_URL"),
                input_size: parse_number(
                    get("FRIDGE_INPUT_SIZE"),
                    "FRIDGE_INPUT_SIZE",
                    DEFAULT_INPUT_SIZE,
                )?,
            },
        })
    }
}

fn parse_number(raw: Option<String>, key: &str, default: u32) -> AppResult<u32> {
    match raw {
        None => Ok(default),
        Some(value) => match value.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AppError::Config(format!(
                "{} must be a positive integer, got {:?}",
                key, value
            ))),
        },
    }
}

fn default_models_dir() -> AppResult<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| AppError::Config("Could not find local data directory".to_string()))?;
    Ok(base.join(APP_DATA_DIR_NAME).join("models"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppResult<ServiceConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_requires_supabase_credentials() {
        assert!(matches!(config_from(&[]), Err(AppError::Config(_))));
        assert!(matches!(
            config_from(&[("SUPABASE_URL", "https://x.supabase.co"), ("SUPABASE_KEY", "  ")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[
            ("SUPABASE_URL", "https://x.supabase.co/"),
            ("SUPABASE_KEY", "secret"),
            ("FRIDGE_MODELS_DIR", "/tmp/models"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr, "0.0.0.0:8001".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.default_bucket, "fridge-images");
        assert_eq!(cfg.storage.base_url, "https://x.supabase.co");
        assert_eq!(cfg.storage.list_limit, 100);
        assert_eq!(cfg.model.input_size, 800);
        assert_eq!(cfg.model.model_url, None);
        assert_eq!(
            cfg.model.model_path(),
            PathBuf::from("/tmp/models/fasterrcnn_resnet50_fpn.onnx")
        );
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let result = config_from(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "secret"),
            ("FRIDGE_MODELS_DIR", "/tmp/models"),
            ("FRIDGE_INPUT_SIZE", "0"),
        ]);
        assert!(matches!(result, Err(AppError::Config(_))));

        let result = config_from(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "secret"),
            ("FRIDGE_MODELS_DIR", "/tmp/models"),
            ("FRIDGE_BIND_ADDR", "not-an-addr"),
        ]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
