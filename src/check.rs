//! Storage configuration check

use tracing::info;

use crate::config::Config;
use crate::errors::{MonitorError, Result};
use crate::store::{self, StoreCounts};

/// Confirm the configured store is reachable and both tables exist
pub async fn check_config(config: &Config) -> Result<StoreCounts> {
    config.validate().map_err(MonitorError::Config)?;

    let store = store::from_config(config)?.ok_or(MonitorError::StorageUnavailable)?;
    info!("Checking {} storage backend", store.name());

    store.ping().await?;
    store.counts().await
}
