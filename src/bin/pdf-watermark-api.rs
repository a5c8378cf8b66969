//! Server binary for pdf-watermark-api.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig` and serves the router until Ctrl+C / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_watermark_api::config::DEFAULT_PORT;
use pdf_watermark_api::{router, ServerConfig};
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port (3200)
  pdf-watermark-api

  # Windows interpreter with spaces in the path
  PY_BIN="C:\Program Files\Python312\python.exe" pdf-watermark-api

  # Stamp an invoice (-f keeps an error JSON out of the PDF file)
  curl -f -F file=@invoice.pdf http://localhost:3200/watermark/lunas -o invoice-LUNAS.pdf

  # Print the resolved configuration and exit
  pdf-watermark-api --check

ENVIRONMENT VARIABLES:
  PORT                          Listen port
  PY_BIN                        Python interpreter (default: python3, python on Windows)
  WATERMARK_HOST                Bind address
  WATERMARK_TOOLS_DIR           Directory containing watermark_lunas.py
  WATERMARK_SCRATCH_DIR         Directory for per-request scratch files
  WATERMARK_MAX_UPLOAD_MB       Request body limit in MiB
  WATERMARK_TRANSFORM_TIMEOUT   Kill the script after this many seconds
  RUST_LOG                      Log filter, overrides --verbose/--quiet

A .env file in the working directory is loaded before flags are parsed.
"#;

/// Watermark uploaded PDFs through an external script.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-watermark-api",
    version,
    about = "HTTP service that watermarks uploaded PDFs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Listen port.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind address.
    #[arg(long, env = "WATERMARK_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Python interpreter used to run the watermark scripts.
    #[arg(long, env = "PY_BIN")]
    python_bin: Option<String>,

    /// Directory containing the watermark scripts (default: `tools` next to
    /// this executable).
    #[arg(long, env = "WATERMARK_TOOLS_DIR")]
    tools_dir: Option<PathBuf>,

    /// Directory for per-request scratch files (default: OS temp dir).
    #[arg(long, env = "WATERMARK_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Maximum upload size in MiB.
    #[arg(long, env = "WATERMARK_MAX_UPLOAD_MB", default_value_t = 25)]
    max_upload_mb: usize,

    /// Kill the watermark script after this many seconds (default: never).
    #[arg(long, env = "WATERMARK_TRANSFORM_TIMEOUT")]
    transform_timeout: Option<u64>,

    /// Print the resolved configuration and exit.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WATERMARK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WATERMARK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case in production.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;

    if cli.check {
        println!("{config:#?}");
        return Ok(());
    }

    tracing::debug!(?config, "Resolved configuration");

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("API running on http://{addr}");

    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Map CLI args to `ServerConfig`.
fn build_config(cli: &Cli) -> Result<ServerConfig> {
    let mut builder = ServerConfig::builder()
        .host(cli.host)
        .port(cli.port)
        .python_bin(cli.python_bin.as_deref().unwrap_or_default())
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .transform_timeout(cli.transform_timeout.map(Duration::from_secs));

    if let Some(ref dir) = cli.tools_dir {
        builder = builder.tools_dir(dir);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
