use crate::config::ServiceConfig;
use crate::services::converter::ConverterService;
use crate::services::worker_pool::BlockingPool;
use std::sync::Arc;
use tracing::info;

pub fn setup_converter(config: &ServiceConfig, pool: Arc<BlockingPool>) -> Arc<ConverterService> {
    let converter = ConverterService::from_config(config, pool);

    // A missing converter is not fatal: requests fail with a 500 until it is installed
    match converter.locate() {
        Ok(path) => info!("🔧 Converter found at {}", path.display()),
        Err(e) => tracing::warn!("⚠️  {}", e),
    }

    Arc::new(converter)
}
