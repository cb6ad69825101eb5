//! HTTP service availability monitor
//!
//! Probes registered endpoints with bounded timeouts, keeps a per-service history
//! of outcomes and a running error count, and serves both over a JSON API.

pub mod check;
pub mod cli;
pub mod config;
pub mod controllers;
pub mod errors;
pub mod models;
pub mod server;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use errors::{MonitorError, Result};
pub use models::{Outcome, ProbeResult};
pub use services::monitoring::Monitor;
pub use services::probe::{HttpProber, Prober};
