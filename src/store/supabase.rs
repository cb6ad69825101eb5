//! Supabase storage backend, spoken to through its PostgREST interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::{HistoryQuery, ServiceStore, StoreCounts};
use crate::errors::{MonitorError, Result};
use crate::models::{NewService, Outcome, ProbeResult, Service, TestRecord};

const SERVICES_TABLE: &str = "services";
const TESTS_TABLE: &str = "service_tests";
const INCREMENT_FUNCTION: &str = "increment_service_errors";

#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ServiceRow {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    name: String,
    url: String,
    #[serde(default)]
    threshold: Option<u64>,
    #[serde(default)]
    errors: Option<u64>,
    created_at: DateTime<Utc>,
}

impl From<ServiceRow> for Service {
    fn from(row: ServiceRow) -> Self {
        Service {
            id: row.id,
            name: row.name,
            url: row.url,
            threshold: row.threshold.unwrap_or_default(),
            errors: row.errors.unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TestRow {
    id: i64,
    #[serde(deserialize_with = "id_as_string")]
    service_id: String,
    success: bool,
    response_time: Option<u64>,
    status_code: Option<u16>,
    error_message: Option<String>,
    timestamp: DateTime<Utc>,
}

impl From<TestRow> for TestRecord {
    fn from(row: TestRow) -> Self {
        let result = if row.success {
            ProbeResult::Success {
                response_time: Duration::from_millis(row.response_time.unwrap_or_default()),
                status: row.status_code.unwrap_or_default(),
            }
        } else {
            ProbeResult::Failure {
                error: row
                    .error_message
                    .unwrap_or_else(|| "unknown error".to_string()),
            }
        };

        TestRecord {
            id: row.id,
            service_id: row.service_id,
            outcome: Outcome {
                result,
                timestamp: row.timestamp,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct NewTestRow<'a> {
    service_id: &'a str,
    success: bool,
    response_time: Option<u64>,
    status_code: Option<u16>,
    error_message: Option<&'a str>,
    timestamp: DateTime<Utc>,
}

// Ids may be bigint or uuid columns depending on the schema
fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected id value: {}",
            other
        ))),
    }
}

/// Total from a `Content-Range` header such as `0-0/42` or `*/0`
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

impl SupabaseStore {
    pub fn new(project_url: String, anon_key: String, request_timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&anon_key)
                .map_err(|e| MonitorError::Config(format!("invalid SUPABASE_ANON_KEY: {}", e)))?,
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", anon_key))
                .map_err(|e| MonitorError::Config(format!("invalid SUPABASE_ANON_KEY: {}", e)))?,
        );

        let client = Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .user_agent(format!("service-monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            timeout: request_timeout,
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn execute(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        debug!("Supabase request: {}", operation);

        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| MonitorError::Storage(format!("{} timed out", operation)))?
            .map_err(|e| MonitorError::Storage(format!("{} failed: {}", operation, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(MonitorError::Storage(format!(
            "{} returned {}: {}",
            operation, status, body
        )))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: Response, operation: &str) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| MonitorError::Storage(format!("{} returned malformed data: {}", operation, e)))
    }

    async fn count(&self, table: &str) -> Result<u64> {
        let operation = format!("count {}", table);
        let response = self
            .execute(
                self.client
                    .get(self.table(table))
                    .query(&[("select", "id"), ("limit", "1")])
                    .header("Prefer", "count=exact"),
                &operation,
            )
            .await?;

        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| MonitorError::Storage(format!("{} returned no Content-Range", operation)))
    }
}

#[async_trait]
impl ServiceStore for SupabaseStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn insert_service(&self, service: NewService) -> Result<Service> {
        let request = self
            .client
            .post(self.table(SERVICES_TABLE))
            .header("Prefer", "return=representation")
            .json(&json!({
                "name": service.name,
                "url": service.url,
                "threshold": service.threshold,
                "errors": 0,
            }));

        let response = self.execute(request, "insert service").await?;
        let mut rows: Vec<ServiceRow> = Self::read_json(response, "insert service").await?;

        rows.pop()
            .map(Service::from)
            .ok_or_else(|| MonitorError::Storage("insert service returned no row".to_string()))
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let request = self
            .client
            .get(self.table(SERVICES_TABLE))
            .query(&[("select", "*"), ("order", "created_at.asc")]);

        let response = self.execute(request, "list services").await?;
        let rows: Vec<ServiceRow> = Self::read_json(response, "list services").await?;

        Ok(rows.into_iter().map(Service::from).collect())
    }

    async fn delete_service(&self, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table(SERVICES_TABLE))
            .query(&[("id", format!("eq.{}", id))]);

        self.execute(request, "delete service").await?;
        Ok(())
    }

    async fn insert_test(&self, service_id: &str, outcome: &Outcome) -> Result<TestRecord> {
        let row = NewTestRow {
            service_id,
            success: outcome.is_success(),
            response_time: outcome.response_time_ms(),
            status_code: outcome.status(),
            error_message: outcome.error(),
            timestamp: outcome.timestamp,
        };
        let request = self
            .client
            .post(self.table(TESTS_TABLE))
            .header("Prefer", "return=representation")
            .json(&row);

        let response = self.execute(request, "insert test").await?;
        let mut rows: Vec<TestRow> = Self::read_json(response, "insert test").await?;

        rows.pop()
            .map(TestRecord::from)
            .ok_or_else(|| MonitorError::Storage("insert test returned no row".to_string()))
    }

    async fn increment_errors(&self, service_id: &str) -> Result<u64> {
        let request = self
            .client
            .post(self.table(&format!("rpc/{}", INCREMENT_FUNCTION)))
            .json(&json!({ "service_id": service_id }));

        let response = self.execute(request, "increment errors").await?;
        Self::read_json(response, "increment errors").await
    }

    async fn list_tests(&self, service_id: &str, query: &HistoryQuery) -> Result<Vec<TestRecord>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("service_id", format!("eq.{}", service_id)),
            ("order", "timestamp.desc".to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(from) = query.from {
            params.push(("timestamp", format!("gte.{}", from.to_rfc3339())));
        }
        if let Some(to) = query.to {
            params.push(("timestamp", format!("lte.{}", to.to_rfc3339())));
        }

        let request = self.client.get(self.table(TESTS_TABLE)).query(&params);
        let response = self.execute(request, "list tests").await?;
        let rows: Vec<TestRow> = Self::read_json(response, "list tests").await?;

        Ok(rows.into_iter().map(TestRecord::from).collect())
    }

    async fn ping(&self) -> Result<()> {
        for table in [SERVICES_TABLE, TESTS_TABLE] {
            let request = self
                .client
                .get(self.table(table))
                .query(&[("select", "id"), ("limit", "1")]);
            self.execute(request, &format!("read {}", table)).await?;
        }
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            services: self.count(SERVICES_TABLE).await?,
            tests: self.count(TESTS_TABLE).await?,
        })
    }
}
