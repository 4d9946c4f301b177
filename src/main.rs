//! Admission gateway.
//!
//! Sits in front of one upstream service, runs every request through the
//! admission pipeline and forwards only what passes.
//!
//! ```text
//!     Client ──▶ http::server ──▶ admission::Pipeline ──▶ proxy::Forwarder ──▶ Upstream
//!                                  rate limit
//!                                  path / method / json / headers / size
//!     Client ◀── Reply ◀──────────── denial (4xx) or relayed response ◀────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{builder::BoolishValueParser, ArgAction, Parser};

use admission_gateway::config::{GatewaySettings, HealthConfig, MetricsConfig};
use admission_gateway::lifecycle::{self, StartupError};
use admission_gateway::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "admission-gateway")]
#[command(about = "HTTP admission gateway in front of a single upstream", long_about = None)]
struct Cli {
    /// Address the gateway listens on.
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:5000")]
    listen_address: String,

    /// Directory containing proxy_config.json and rules_config.json.
    #[arg(long, env = "CONFIG_LOCATION")]
    config_location: Option<PathBuf>,

    #[arg(long, env = "HEALTHCHECK_ENABLED", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    healthcheck_enabled: bool,

    #[arg(long, env = "HEALTHCHECK_PORT", default_value_t = 9000)]
    healthcheck_port: u16,

    #[arg(long, env = "METRICS_ENABLED", default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    metrics_enabled: bool,

    #[arg(long, env = "METRICS_PORT", default_value_t = 9100)]
    metrics_port: u16,

    /// Upstream timeout in seconds.
    #[arg(long, env = "FORWARD_TIMEOUT_SECS", default_value_t = 180)]
    forward_timeout_secs: u64,

    /// Largest inbound body buffered before admission, in bytes.
    #[arg(long, env = "BODY_BUFFER_LIMIT", default_value_t = 10 * 1024 * 1024)]
    body_buffer_limit: usize,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl From<Cli> for GatewaySettings {
    fn from(cli: Cli) -> Self {
        GatewaySettings {
            listen_address: cli.listen_address,
            config_location: cli.config_location,
            health: HealthConfig {
                enabled: cli.healthcheck_enabled,
                port: cli.healthcheck_port,
            },
            metrics: MetricsConfig {
                enabled: cli.metrics_enabled,
                port: cli.metrics_port,
            },
            forward_timeout_secs: cli.forward_timeout_secs,
            body_buffer_limit: cli.body_buffer_limit,
            log_level: cli.log_level,
        }
    }
}

/// Log line for a fatal error; a serve error happens after startup completed.
fn failure_message(err: &StartupError) -> &'static str {
    match err {
        StartupError::Serve(_) => "Server stopped with error",
        _ => "Startup failed",
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = GatewaySettings::from(Cli::parse());
    logging::init(&settings.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_address = %settings.listen_address,
        forward_timeout_secs = settings.forward_timeout_secs,
        "admission-gateway starting"
    );

    match lifecycle::run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "{}", failure_message(&e));
            eprintln!("admission-gateway: {e}");
            ExitCode::FAILURE
        }
    }
}
