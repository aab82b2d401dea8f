//! CPE Gateway - CDM intake for collision probability estimation
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP gateway (default subcommand)
//! cpe-gateway --queue-root /srv/cpe/queue
//!
//! # Print the queue encoding for a CDM without queueing it
//! cpe-gateway extract conjunction.cdm
//! cat conjunction.cdm | cpe-gateway extract -
//! ```
//!
//! # Environment Variables
//!
//! - `CPE_CONFIG`: Path to a TOML config file
//! - `CPE_SERVER_ADDR`, `CPE_QUEUE_ROOT`, `CPE_MAX_BODY_BYTES`, `CPE_CHUNK_SIZE`: config overrides
//! - `CPE_LOG_FORMAT`: `pretty` (default) or `json`
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use cpe_gateway::api::create_app;
use cpe_gateway::cdm::Conjunction;
use cpe_gateway::config::GatewayConfig;
use cpe_gateway::queue::encoding;
use cpe_gateway::{FsQueue, Gateway};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cpe-gateway")]
#[command(about = "CDM intake gateway for collision probability estimation")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides CPE_CONFIG and ./cpe_gateway.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "CPE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<SubCommand>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Override the queue root directory
    #[arg(long, value_name = "DIR")]
    queue_root: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP gateway
    Serve(ServeArgs),

    /// Extract both objects from a CDM and print the job input encoding
    Extract {
        /// CDM file, or `-` for stdin
        input: String,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_extract(input: &str) -> Result<()> {
    let mut text = String::new();
    if input == "-" {
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read CDM from stdin")?;
    } else {
        text = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read CDM file {input}"))?;
    }

    let conjunction = Conjunction::from_cdm(&text);
    for (block, object) in [("OBJECT1", &conjunction.object1), ("OBJECT2", &conjunction.object2)] {
        if !object.is_complete() {
            tracing::warn!(
                block,
                missing_state = ?object.missing_state_fields(),
                missing_covariance = object.missing_covariance(),
                "Incomplete CDM object"
            );
        }
    }

    println!("{}", encoding::encode(&conjunction));
    Ok(())
}

async fn run_server(config_path: Option<PathBuf>, overrides: ServeArgs) -> Result<()> {
    let (mut config, source) = GatewayConfig::load(config_path.as_deref())
        .context("Failed to load gateway configuration")?;
    config.apply_env_overrides();
    if let Some(addr) = overrides.addr {
        config.server.addr = addr;
    }
    if let Some(root) = overrides.queue_root {
        config.queue.root = root;
    }
    config
        .validate()
        .context("Invalid gateway configuration after overrides")?;
    config.log_summary(&source);

    if !config.queue.root.is_dir() {
        tracing::warn!(
            queue_root = %config.queue.root.display(),
            "Queue root does not exist yet; every owner will be rejected until it is provisioned"
        );
    }

    let queue = FsQueue::new(&config.queue.root).with_chunk_size(config.queue.chunk_size);
    let app = create_app(Gateway::new(queue), config.limits.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.addr))?;
    info!(addr = %config.server.addr, "CPE gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Received shutdown signal");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    init_tracing(args.log_format);

    match args.command {
        Some(SubCommand::Extract { input }) => run_extract(&input),
        Some(SubCommand::Serve(serve)) => run_server(args.config, serve).await,
        None => run_server(args.config, args.serve).await,
    }
}
