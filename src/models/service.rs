use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::probe::Outcome;

/// A registered monitoring target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Latency threshold in milliseconds, used by consumers for classification
    pub threshold: u64,
    /// Running tally of failed probes
    pub errors: u64,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering a service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewService {
    pub name: String,
    pub url: String,
    pub threshold: u64,
}

/// A persisted probe outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub id: i64,
    pub service_id: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// A service together with its recent history, as returned to callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: Service,
    pub history: Vec<TestRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
}

impl ServiceView {
    pub fn new(service: Service, history: Vec<TestRecord>) -> Self {
        Self {
            service,
            history,
            history_error: None,
        }
    }

    /// Base fields only, with the reason the history could not be loaded
    pub fn without_history(service: Service, error: String) -> Self {
        Self {
            service,
            history: Vec::new(),
            history_error: Some(error),
        }
    }
}
