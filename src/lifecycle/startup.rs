//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration, reconciling environment overrides
//! - Install the metrics exporter
//! - Bind the gateway and liveness listeners
//! - Run until a shutdown signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is bound
//! - Listeners bind last, so traffic only arrives once the policy is final

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_policy, ConfigError, GatewaySettings, PolicySet};
use crate::health::serve_liveness;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

fn log_policy(policy: &PolicySet) {
    let dest = &policy.destination;
    tracing::info!(
        upstream = %format!("http://{}:{}{}", dest.host, dest.port, dest.base_path),
        method_validation = policy.methods.enabled,
        uri_validation = policy.uris.enabled,
        header_validation = policy.headers.enabled,
        payload_limiting = policy.payload.enabled,
        json_validation = policy.json.enabled,
        rate_limit = %policy
            .rate_limit
            .map(|r| r.to_string())
            .unwrap_or_else(|| "disabled".to_string()),
        "Policy loaded"
    );
}

/// Resolve configuration and serve until shutdown.
pub async fn run(settings: GatewaySettings) -> Result<(), StartupError> {
    let policy = load_policy(settings.config_location.as_deref(), |key| {
        std::env::var(key).ok()
    })?;
    log_policy(&policy);

    let shutdown = Shutdown::new();

    if settings.metrics.enabled {
        metrics::init_metrics(SocketAddr::from(([0, 0, 0, 0], settings.metrics.port)))?;
    }

    let listener = bind(&settings.listen_address).await?;

    if settings.health.enabled {
        let address = format!("0.0.0.0:{}", settings.health.port);
        let liveness = bind(&address).await?;
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_liveness(liveness, rx).await {
                tracing::error!(error = %e, "Liveness endpoint failed");
            }
        });
    }

    let server = HttpServer::new(Arc::new(policy), &settings);
    let rx = shutdown.subscribe();
    tokio::spawn(signals::trigger_on_signal(shutdown));

    server.run(listener, rx).await.map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
