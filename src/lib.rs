mod ai;
mod config;
mod errors;
mod imaging;
mod pipeline;
mod reducer;
mod selector;
mod server;
mod storage;
mod vocabulary;

use ai::DetectorService;
use anyhow::Context;
use config::ServiceConfig;
use server::AppState;
use std::sync::Arc;
use storage::SupabaseStorage;
use tokio_util::sync::CancellationToken;

pub use errors::{AppError, AppResult};
pub use pipeline::DetectionReport;
pub use reducer::Ingredient;

pub fn run() -> anyhow::Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::from_env().context("Failed to read configuration")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(async move {
        ai::ensure_model_file(&config.model)
            .await
            .context("Detection model is not available")?;

        let model_config = config.model.clone();
        let detector = tokio::task::spawn_blocking(move || -> AppResult<DetectorService> {
            let mut service = DetectorService::new();
            service.load(&model_config)?;
            Ok(service)
        })
        .await
        .context("Model loading task panicked")??;

        let storage = SupabaseStorage::new(&config.storage)?;
        let state = Arc::new(AppState {
            storage: Arc::new(storage),
            detector: Arc::new(detector),
            default_bucket: config.default_bucket.clone(),
        });

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutdown signal received");
                shutdown.cancel();
            }
        });

        server::serve(config.bind_addr, state, cancel).await?;
        Ok::<(), anyhow::Error>(())
    })
}
