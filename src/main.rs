//! request-trace demo service.
//!
//! ```text
//!   Client ──▶ TraceLayer ──▶ CorrelationLayer ──▶ handler ──▶ TracedClient ──▶ Upstream
//!                               │                     │
//!                               ▼                     ▼
//!                         request tags         JSON log lines
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_trace::config::{load_config, TraceConfig};
use request_trace::http::HttpServer;

#[derive(Parser)]
#[command(name = "request-trace")]
#[command(about = "Correlation-id propagating demo service", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_trace=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("request-trace v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TraceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        outbound = ?config.middleware.outbound,
        log_level = %config.logging.level,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let server = HttpServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
