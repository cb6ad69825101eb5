//! Configuration management for the service monitor

use std::env;
use std::time::Duration;

use crate::services::monitoring::DEFAULT_THRESHOLD_MS;
use crate::services::probe::DEFAULT_PROBE_TIMEOUT;

/// Where service and test history is kept
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    /// Nothing configured; storage-backed endpoints answer 503
    None,

    /// Process-local tables, lost on restart
    Memory,

    /// Supabase (PostgREST) project
    Supabase { url: String, anon_key: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Interface the HTTP server binds to
    pub host: String,

    /// Port the HTTP server binds to
    pub port: u16,

    /// Probe timeout used when a request does not carry one
    pub probe_timeout: Duration,

    /// Threshold assigned to services registered without one, in milliseconds
    pub default_threshold_ms: u64,

    /// Storage backend selection
    pub storage: StorageBackend,

    /// Timeout for a single storage request
    pub store_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            default_threshold_ms: DEFAULT_THRESHOLD_MS,
            storage: StorageBackend::None,
            store_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }

        if let Some(timeout) = lookup("PROBE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                config.probe_timeout = Duration::from_millis(ms);
            }
        }

        if let Some(threshold) = lookup("DEFAULT_THRESHOLD_MS") {
            if let Ok(ms) = threshold.parse() {
                config.default_threshold_ms = ms;
            }
        }

        if let Some(timeout) = lookup("STORE_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.store_timeout = Duration::from_secs(seconds);
            }
        }

        let supabase_url = lookup("SUPABASE_URL").filter(|v| !v.trim().is_empty());
        let supabase_key = lookup("SUPABASE_ANON_KEY").filter(|v| !v.trim().is_empty());

        config.storage = match lookup("STORAGE_BACKEND").map(|b| b.to_lowercase()) {
            Some(backend) if backend == "memory" => StorageBackend::Memory,
            Some(backend) if backend == "none" => StorageBackend::None,
            Some(backend) if backend == "supabase" => StorageBackend::Supabase {
                url: supabase_url.unwrap_or_default(),
                anon_key: supabase_key.unwrap_or_default(),
            },
            _ => match (supabase_url, supabase_key) {
                (Some(url), Some(anon_key)) => StorageBackend::Supabase { url, anon_key },
                _ => StorageBackend::None,
            },
        };

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host cannot be empty".to_string());
        }

        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }

        if self.probe_timeout.is_zero() {
            return Err("probe timeout must be greater than 0".to_string());
        }

        if self.store_timeout.is_zero() {
            return Err("store timeout must be greater than 0".to_string());
        }

        if let StorageBackend::Supabase { url, anon_key } = &self.storage {
            if url.is_empty() {
                return Err("SUPABASE_URL is not set".to_string());
            }
            if anon_key.is_empty() {
                return Err("SUPABASE_ANON_KEY is not set".to_string());
            }
        }

        Ok(())
    }
}
