use actix_web::web;
use std::time::Duration;

use crate::errors::{MonitorError, Result};

pub mod health;
pub mod probe;
pub mod service;

/// Mount every `/api` route along with JSON and query error handling
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        MonitorError::Validation(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        MonitorError::Validation(format!("Invalid query string: {}", err)).into()
    }))
    .service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .route("/services", web::get().to(service::list_services))
            .route("/services", web::post().to(service::register_service))
            .route("/services/{id}", web::delete().to(service::remove_service))
            .route("/services/{id}/tests", web::get().to(service::service_history))
            .route("/test", web::post().to(probe::test_service))
            .route("/test-multiple", web::post().to(probe::test_multiple))
            .route("/test-all", web::post().to(probe::test_all)),
    );
}

/// Requested timeout in milliseconds, or the default when absent
pub(crate) fn resolve_timeout(requested: Option<u64>, default: Duration) -> Result<Duration> {
    match requested {
        None => Ok(default),
        Some(0) => Err(MonitorError::Validation(
            "timeout must be greater than 0".to_string(),
        )),
        Some(ms) => Ok(Duration::from_millis(ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_timeout() {
        let default = Duration::from_secs(10);
        assert_eq!(resolve_timeout(None, default).unwrap(), default);
        assert_eq!(
            resolve_timeout(Some(250), default).unwrap(),
            Duration::from_millis(250)
        );
        assert!(resolve_timeout(Some(0), default).is_err());
    }
}
