//! HTTP server wiring

use actix_web::{App, HttpServer, middleware::Logger, web};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::controllers;
use crate::errors::Result;
use crate::services::monitoring::Monitor;
use crate::services::probe::HttpProber;
use crate::state::AppState;
use crate::store;

/// Assemble the monitor described by `config`
pub fn build_monitor(config: &Config) -> Result<Monitor> {
    let prober = Arc::new(HttpProber::new()?);
    let store = store::from_config(config)?;

    match &store {
        Some(store) => info!("Using {} storage backend", store.name()),
        None => info!("No storage backend configured; service registry endpoints are disabled"),
    }

    Ok(Monitor::new(prober, store).with_defaults(config.probe_timeout, config.default_threshold_ms))
}

/// Serve the API until the process is stopped
pub async fn run(config: Config) -> Result<()> {
    let state = web::Data::new(AppState::new(build_monitor(&config)?));

    info!("Server is live at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(controllers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
