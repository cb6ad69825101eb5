use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::info;

use crate::errors::MonitorError;
use crate::models::requests::{HistoryParams, RegisterRequest};
use crate::state::AppState;
use crate::store::HistoryQuery;

// Register a new service to monitor
pub async fn register_service(
    data: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, MonitorError> {
    let body = body.into_inner();
    let name = body.name.unwrap_or_default();
    let url = body.url.unwrap_or_default();
    info!("Request to register service: {}", name);

    let view = data.monitor.register(&name, &url, body.threshold).await?;

    Ok(HttpResponse::Created().json(view))
}

// List all registered services with their recent history
pub async fn list_services(data: web::Data<AppState>) -> Result<HttpResponse, MonitorError> {
    info!("Request to list all services");
    let services = data.monitor.list().await?;
    info!("Returning list of {} services", services.len());

    Ok(HttpResponse::Ok().json(services))
}

// Remove a service from monitoring
pub async fn remove_service(
    data: web::Data<AppState>,
    service_id: web::Path<String>,
) -> Result<HttpResponse, MonitorError> {
    let id = service_id.into_inner();
    info!("Request to remove service: {}", id);

    data.monitor.delete(&id).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

// Test history of one service
pub async fn service_history(
    data: web::Data<AppState>,
    service_id: web::Path<String>,
    params: web::Query<HistoryParams>,
) -> Result<HttpResponse, MonitorError> {
    let id = service_id.into_inner();
    let query = HistoryQuery::from_bounds(
        params.from.as_deref(),
        params.to.as_deref(),
        params.limit,
    )?;
    info!("Request for history of service {} (limit {})", id, query.limit);

    let records = data.monitor.history(&id, &query).await?;

    Ok(HttpResponse::Ok().json(records))
}
