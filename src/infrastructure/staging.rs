use crate::config::ServiceConfig;
use crate::services::staging::StagingArea;
use std::sync::Arc;
use tracing::info;

pub async fn setup_staging(config: &ServiceConfig) -> anyhow::Result<Arc<StagingArea>> {
    let root = config.staging_root();
    tokio::fs::create_dir_all(&root).await?;
    info!("📁 Staging uploads under {}", root.display());
    Ok(Arc::new(StagingArea::new(root)))
}
