//! Server settings loaded via OrthoConfig.
//!
//! Values come from `SERVICE_*` environment variables, configuration files,
//! and command-line flags, in OrthoConfig's usual precedence.

use std::net::SocketAddr;
use std::time::Duration;

use mockable::Env;
use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::monitor::discover_dsn;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Errors raised while interpreting loaded settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// The bind address is not a `host:port` socket address.
    #[error("invalid bind address {value:?}: {message}")]
    InvalidBindAddr { value: String, message: String },
}

/// Process-level settings for the HTTP service and crash reporting.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SERVICE")]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// Crash reporting endpoint. Falls back to the well-known DSN
    /// environment variables when unset.
    pub crash_report_dsn: Option<String>,
    /// Seconds to wait for pending crash reports on exit.
    #[ortho_config(default = 15)]
    pub crash_flush_seconds: u64,
}

impl ServerSettings {
    /// Parsed bind address, defaulting to `0.0.0.0:8080`.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value
            .parse()
            .map_err(|err: std::net::AddrParseError| SettingsError::InvalidBindAddr {
                value: value.to_owned(),
                message: err.to_string(),
            })
    }

    /// Configured DSN, or the first DSN found in the environment.
    pub fn crash_report_dsn<E: Env>(&self, env: &E) -> Option<String> {
        self.crash_report_dsn
            .clone()
            .filter(|dsn| !dsn.trim().is_empty())
            .or_else(|| discover_dsn(env))
    }

    /// Upper bound on the exit-time flush.
    pub fn crash_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.crash_flush_seconds)
    }
}
