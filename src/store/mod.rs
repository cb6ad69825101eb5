//! Storage collaborator for services and their test history
//!
//! Two tables back every implementation: `services` and `service_tests`, where
//! `service_tests.service_id` references `services.id` and is removed with it.

mod memory;
mod supabase;

pub use memory::InMemoryStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::errors::{MonitorError, Result};
use crate::models::{NewService, Outcome, Service, TestRecord};

/// Default number of records returned by a history query
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Row counts of both tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub services: u64,
    pub tests: u64,
}

/// Bounds for a history read; records come back newest first
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl HistoryQuery {
    /// The `limit` most recent records, unbounded in time
    pub fn recent(limit: usize) -> Self {
        Self {
            from: None,
            to: None,
            limit,
        }
    }

    /// Build a query from caller-supplied bounds.
    ///
    /// `from` is a date (midnight UTC) or an RFC 3339 instant. `to` is a calendar
    /// date whose last millisecond, 23:59:59.999 UTC, is the inclusive upper bound.
    pub fn from_bounds(from: Option<&str>, to: Option<&str>, limit: Option<usize>) -> Result<Self> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if limit == 0 {
            return Err(MonitorError::Validation(
                "limit must be greater than 0".to_string(),
            ));
        }

        let from = from
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_lower_bound(s.trim()))
            .transpose()?;
        let to = to
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_upper_bound(s.trim()))
            .transpose()?;

        Ok(Self { from, to, limit })
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| *timestamp >= from) && self.to.is_none_or(|to| *timestamp <= to)
    }
}

fn parse_lower_bound(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    let start_of_day = parse_date(value, "from")?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| MonitorError::Validation(format!("Invalid 'from' date: {}", value)))?;
    Ok(start_of_day.and_utc())
}

fn parse_upper_bound(value: &str) -> Result<DateTime<Utc>> {
    let date = match DateTime::parse_from_rfc3339(value) {
        Ok(instant) => instant.with_timezone(&Utc).date_naive(),
        Err(_) => parse_date(value, "to")?,
    };
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| MonitorError::Validation("invalid end of day".to_string()))?;
    Ok(date.and_time(end_of_day).and_utc())
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        MonitorError::Validation(format!(
            "Invalid '{}' date: {} (expected YYYY-MM-DD or RFC 3339)",
            field, value
        ))
    })
}

/// Persistence operations the monitor depends on
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Short backend name for health output and logs
    fn name(&self) -> &'static str;

    /// Create a service with a zero error count
    async fn insert_service(&self, service: NewService) -> Result<Service>;

    /// All services, oldest first
    async fn list_services(&self) -> Result<Vec<Service>>;

    /// Remove a service and, by cascade, its test records. Unknown ids are not an error.
    async fn delete_service(&self, id: &str) -> Result<()>;

    /// Append a test record for an existing service
    async fn insert_test(&self, service_id: &str, outcome: &Outcome) -> Result<TestRecord>;

    /// Atomically add one to the service's error counter, returning the new value
    async fn increment_errors(&self, service_id: &str) -> Result<u64>;

    /// Records of one service matching the query, newest first
    async fn list_tests(&self, service_id: &str, query: &HistoryQuery) -> Result<Vec<TestRecord>>;

    /// Cheap round trip proving both tables are reachable
    async fn ping(&self) -> Result<()>;

    async fn counts(&self) -> Result<StoreCounts>;
}

/// Build the configured store, if any
pub fn from_config(config: &Config) -> Result<Option<Arc<dyn ServiceStore>>> {
    let store: Option<Arc<dyn ServiceStore>> = match &config.storage {
        StorageBackend::None => None,
        StorageBackend::Memory => Some(Arc::new(InMemoryStore::new())),
        StorageBackend::Supabase { url, anon_key } => Some(Arc::new(SupabaseStore::new(
            url.clone(),
            anon_key.clone(),
            config.store_timeout,
        )?)),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_single_day_window() {
        let query = HistoryQuery::from_bounds(Some("2024-01-01"), Some("2024-01-01"), None).unwrap();

        assert_eq!(query.limit, DEFAULT_HISTORY_LIMIT);
        assert!(query.contains(&Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert!(query.contains(&Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap()));
        assert!(!query.contains(&Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()));
        assert!(!query.contains(&Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_instant_bounds() {
        let query = HistoryQuery::from_bounds(
            Some("2024-03-10T12:00:00Z"),
            Some("2024-03-10T08:00:00+00:00"),
            Some(5),
        )
        .unwrap();

        assert!(!query.contains(&Utc.with_ymd_and_hms(2024, 3, 10, 11, 59, 59).unwrap()));
        assert!(query.contains(&Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap()));
        assert_eq!(query.limit, 5);
    }

    #[test]
    fn test_invalid_bounds_are_rejected() {
        assert!(matches!(
            HistoryQuery::from_bounds(Some("yesterday"), None, None),
            Err(MonitorError::Validation(_))
        ));
        assert!(matches!(
            HistoryQuery::from_bounds(None, None, Some(0)),
            Err(MonitorError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_bounds_are_ignored() {
        let query = HistoryQuery::from_bounds(Some(""), Some(" "), None).unwrap();
        assert_eq!(query, HistoryQuery::recent(DEFAULT_HISTORY_LIMIT));
    }
}
