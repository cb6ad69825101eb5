//! In-process storage backend

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{HistoryQuery, ServiceStore, StoreCounts};
use crate::errors::{MonitorError, Result};
use crate::models::{NewService, Outcome, Service, TestRecord};

#[derive(Debug, Default)]
struct Tables {
    services: Vec<Service>,
    tests: Vec<TestRecord>,
    next_test_id: i64,
}

/// Thread-safe tables kept in memory; contents are lost on restart
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn service_not_found(id: &str) -> MonitorError {
    MonitorError::Storage(format!("service {} does not exist", id))
}

#[async_trait]
impl ServiceStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert_service(&self, service: NewService) -> Result<Service> {
        let created = Service {
            id: Uuid::new_v4().to_string(),
            name: service.name,
            url: service.url,
            threshold: service.threshold,
            errors: 0,
            created_at: Utc::now(),
        };

        let mut tables = self.tables.write().await;
        tables.services.push(created.clone());
        debug!("Stored service {}, {} total", created.id, tables.services.len());

        Ok(created)
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        Ok(self.tables.read().await.services.clone())
    }

    async fn delete_service(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.services.retain(|s| s.id != id);
        tables.tests.retain(|t| t.service_id != id);
        Ok(())
    }

    async fn insert_test(&self, service_id: &str, outcome: &Outcome) -> Result<TestRecord> {
        let mut tables = self.tables.write().await;
        if !tables.services.iter().any(|s| s.id == service_id) {
            return Err(service_not_found(service_id));
        }

        tables.next_test_id += 1;
        let record = TestRecord {
            id: tables.next_test_id,
            service_id: service_id.to_string(),
            outcome: outcome.clone(),
        };
        tables.tests.push(record.clone());

        Ok(record)
    }

    async fn increment_errors(&self, service_id: &str) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let service = tables
            .services
            .iter_mut()
            .find(|s| s.id == service_id)
            .ok_or_else(|| service_not_found(service_id))?;

        service.errors += 1;
        Ok(service.errors)
    }

    async fn list_tests(&self, service_id: &str, query: &HistoryQuery) -> Result<Vec<TestRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<TestRecord> = tables
            .tests
            .iter()
            .filter(|t| t.service_id == service_id && query.contains(&t.outcome.timestamp))
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            b.outcome
                .timestamp
                .cmp(&a.outcome.timestamp)
                .then(b.id.cmp(&a.id))
        });
        records.truncate(query.limit);

        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let tables = self.tables.read().await;
        Ok(StoreCounts {
            services: tables.services.len() as u64,
            tests: tables.tests.len() as u64,
        })
    }
}
