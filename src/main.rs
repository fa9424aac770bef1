//! SigV4 signing reverse proxy.
//!
//! Accepts plain HTTP from local clients and forwards every request to one
//! configured upstream, signed with AWS Signature Version 4.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ auth gate ──▶ header normalizer
//!                                                        │
//!                                                        ▼
//!                                                  path resolver
//!                                                        │
//!                                                        ▼
//!     Client Response                   credentials ──▶ signer
//!     ◀────────────── relay ◀──── upstream client ◀──────┘
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::net::TcpListener;

use sigv4_proxy::config::{load_config, LogFormat};
use sigv4_proxy::lifecycle::{wait_for_signal, Shutdown};
use sigv4_proxy::observability::{logging::init_logging, metrics::init_metrics};
use sigv4_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "sigv4-proxy")]
#[command(about = "Reverse proxy that signs requests with AWS SigV4", long_about = None)]
struct Cli {
    /// Path to the YAML (or `.toml`) configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override the configured diagnostic log format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let format_override = cli.log_format.map(LogFormat::from);

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            init_logging(format_override.unwrap_or_default());
            tracing::error!(path = %cli.config.display(), error = %err, "Failed to load configuration");
            return Err(err.into());
        }
    };

    init_logging(format_override.unwrap_or(config.log_format));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sigv4-proxy starting");

    if let Some(address) = &config.metrics_address {
        match address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
        }
    }

    let server = HttpServer::new(&config)?;

    let listener = TcpListener::bind(config.listen_addr()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(wait_for_signal(shutdown));

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
