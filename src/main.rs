//! Service monitor binary

use clap::Parser;
use service_monitor::cli::{Cli, Command};
use service_monitor::{Config, Result, check, server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }

            if let Err(e) = config.validate() {
                error!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }

            info!("Starting service monitor v{}", env!("CARGO_PKG_VERSION"));
            server::run(config).await
        }
        Command::CheckConfig => match check::check_config(&config).await {
            Ok(counts) => {
                println!("Storage configuration is valid");
                println!("  services: {}", counts.services);
                println!("  tests:    {}", counts.tests);
                Ok(())
            }
            Err(e) => {
                eprintln!("Storage configuration check failed: {}", e);
                std::process::exit(1);
            }
        },
    }
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
