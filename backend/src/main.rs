//! Service entry-point: loads settings, wires the in-memory store, and runs
//! the HTTP server under the crash monitor.

use std::sync::Arc;

use actix_web::web;
use mockable::{DefaultClock, DefaultEnv};
use ortho_config::OrthoConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use service_backend::config::ServerSettings;
use service_backend::inbound::http::health::HealthState;
use service_backend::monitor::{Monitor, TracingCrashReporter};
use service_backend::outbound::InMemoryCommitStore;
use service_backend::server::{AppDependencies, build_http_state, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load().map_err(|e| {
        std::io::Error::other(format!("failed to load server settings: {e}"))
    })?;
    let bind_addr = settings
        .bind_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let env = DefaultEnv::new();
    let reporter = TracingCrashReporter::new(settings.crash_report_dsn(&env));
    let monitor = Monitor::new(Arc::new(reporter), settings.crash_flush_timeout());

    let health_state = web::Data::new(HealthState::new());
    let http_state = build_http_state(Arc::new(InMemoryCommitStore::new()), Arc::new(DefaultClock));
    let deps = AppDependencies {
        health_state: health_state.clone(),
        http_state,
    };

    monitor
        .run(
            async move { create_server(deps, bind_addr)?.await },
            |failure| {
                health_state.mark_unhealthy();
                match failure {
                    Some(err) => error!(error = %err, "server terminated with an error"),
                    None => info!("shutting down"),
                }
            },
        )
        .await
}
