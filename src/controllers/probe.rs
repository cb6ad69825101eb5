use actix_web::{HttpResponse, web};
use tracing::info;

use super::resolve_timeout;
use crate::errors::MonitorError;
use crate::models::requests::{ProbeTarget, TestAllRequest, TestMultipleRequest, TestRequest};
use crate::state::AppState;

// Probe one URL, recording the result when a service id is supplied
pub async fn test_service(
    data: web::Data<AppState>,
    body: web::Json<TestRequest>,
) -> Result<HttpResponse, MonitorError> {
    let body = body.into_inner();
    let url = body
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| MonitorError::Validation("URL is required".to_string()))?;
    let timeout = resolve_timeout(body.timeout, data.monitor.default_timeout())?;

    let outcome = data
        .monitor
        .record_test(url.trim(), timeout, body.service_id.as_deref())
        .await;

    Ok(HttpResponse::Ok().json(outcome))
}

// Probe a caller-supplied list of targets concurrently
pub async fn test_multiple(
    data: web::Data<AppState>,
    body: web::Json<TestMultipleRequest>,
) -> Result<HttpResponse, MonitorError> {
    let body = body.into_inner();
    let services = match body.services {
        Some(services @ serde_json::Value::Array(_)) => services,
        _ => {
            return Err(MonitorError::Validation(
                "Services array is required".to_string(),
            ));
        }
    };
    let targets: Vec<ProbeTarget> = serde_json::from_value(services)
        .map_err(|e| MonitorError::Validation(format!("Invalid services entry: {}", e)))?;
    let timeout = resolve_timeout(body.timeout, data.monitor.default_timeout())?;
    info!("Request to test {} services", targets.len());

    let results = data.monitor.test_multiple(targets, timeout).await;

    Ok(HttpResponse::Ok().json(results))
}

// Probe and record every registered service; an empty body means defaults
pub async fn test_all(
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, MonitorError> {
    let body: TestAllRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestAllRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| MonitorError::Validation(format!("Invalid request body: {}", e)))?
    };
    let timeout = resolve_timeout(body.timeout, data.monitor.default_timeout())?;
    info!("Request to test all services");

    let summary = data.monitor.test_all(timeout).await?;

    Ok(HttpResponse::Ok().json(summary))
}
