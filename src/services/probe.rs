//! Single liveness checks against HTTP targets

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

use crate::errors::{MonitorError, Result};
use crate::models::Outcome;

/// Timeout applied when a caller does not ask for one
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Performs one timed liveness check and reports what happened
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> Outcome;
}

/// Prober issuing a single HEAD request per check
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("service-monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self { client })
    }
}

/// Error message with its source chain, e.g. "error sending request: connection refused"
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, address: &str, timeout_duration: Duration) -> Outcome {
        let url = match Url::parse(address) {
            Ok(url) => url,
            Err(e) => return Outcome::failure(format!("Invalid URL '{}': {}", address, e)),
        };

        if timeout_duration.is_zero() {
            return Outcome::failure("Timeout must be greater than 0");
        }

        let started = Instant::now();
        let outcome = match timeout(timeout_duration, self.client.head(url).send()).await {
            Ok(Ok(response)) => Outcome::success(started.elapsed(), response.status().as_u16()),
            Ok(Err(e)) => Outcome::failure(describe(&e)),
            Err(_) => Outcome::failure(format!(
                "Request timed out after {}ms",
                timeout_duration.as_millis()
            )),
        };

        debug!(
            "Probed {} in {}ms: success={}",
            address,
            started.elapsed().as_millis(),
            outcome.is_success()
        );

        outcome
    }
}
