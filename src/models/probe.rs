use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// What a single probe observed
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Success { response_time: Duration, status: u16 },
    Failure { error: String },
}

/// Result of one probe, stamped with its capture time
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: ProbeResult,
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    pub fn success(response_time: Duration, status: u16) -> Self {
        Self {
            result: ProbeResult::Success {
                response_time,
                status,
            },
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: ProbeResult::Failure {
                error: error.into(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, ProbeResult::Success { .. })
    }

    pub fn response_time_ms(&self) -> Option<u64> {
        match &self.result {
            ProbeResult::Success { response_time, .. } => Some(response_time.as_millis() as u64),
            ProbeResult::Failure { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match &self.result {
            ProbeResult::Success { status, .. } => Some(*status),
            ProbeResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.result {
            ProbeResult::Success { .. } => None,
            ProbeResult::Failure { error } => Some(error),
        }
    }
}

// Wire shape: {success, responseTime, status?, error?, timestamp}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeBody<'a> {
    success: bool,
    response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: &'a DateTime<Utc>,
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutcomeBody {
            success: self.is_success(),
            response_time: self.response_time_ms(),
            status: self.status(),
            error: self.error(),
            timestamp: &self.timestamp,
        }
        .serialize(serializer)
    }
}

/// Probe outcome tagged with the caller-supplied target
#[derive(Debug, Clone, Serialize)]
pub struct NamedOutcome {
    pub name: Option<String>,
    pub url: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// One service's line in a sweep
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub service_id: String,
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Totals and per-service outcomes of a test-all sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub tested: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<SweepEntry>,
    pub timestamp: DateTime<Utc>,
}

impl SweepSummary {
    pub fn from_results(results: Vec<SweepEntry>) -> Self {
        let successful = results.iter().filter(|r| r.outcome.is_success()).count();
        Self {
            tested: results.len(),
            successful,
            failed: results.len() - successful,
            results,
            timestamp: Utc::now(),
        }
    }
}
