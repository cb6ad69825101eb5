use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::services::monitoring::Monitor;

/// Liveness of the monitor itself and of its store
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
}

pub async fn health_report(monitor: &Monitor) -> HealthReport {
    let database = match monitor.store() {
        None => "not configured",
        Some(store) => match store.ping().await {
            Ok(()) => "connected",
            Err(e) => {
                warn!("Health check could not reach {} store: {}", store.name(), e);
                "unreachable"
            }
        },
    };

    HealthReport {
        status: "ok",
        timestamp: Utc::now(),
        database,
    }
}
