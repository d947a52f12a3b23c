//! Background removal server entry point
//!
//! Parses arguments, installs the tracing subscriber, loads the model once
//! and serves the HTTP API until Ctrl-C or SIGTERM.

use super::config::CliConfigBuilder;
use crate::{
    backends,
    processor::BackgroundRemovalProcessor,
    server::{create_router, AppState},
    tracing_config::{spans, TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// HTTP server that removes image backgrounds
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "rmbg-server")]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "RMBG_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind
    #[arg(short, long, env = "RMBG_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Model name (u2net, u2netp, u2net_human_seg, silueta, isnet-general-use)
    #[arg(short, long, env = "RMBG_MODEL", default_value = "u2net")]
    pub model: String,

    /// Explicit path to the model's .onnx file [default: $U2NET_HOME/<model>.onnx or ~/.u2net/<model>.onnx]
    #[arg(long, env = "RMBG_MODEL_PATH", value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, env = "RMBG_EXECUTION_PROVIDER", default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Number of inference threads (0 = auto-detect optimal threading)
    #[arg(short, long, env = "RMBG_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Skip mask refinement (opening, blur, threshold) and keep soft edges
    #[arg(long, env = "RMBG_NO_POST_PROCESS")]
    pub no_post_process: bool,

    /// Largest accepted request body in bytes
    #[arg(long, env = "RMBG_MAX_UPLOAD_BYTES", default_value_t = crate::config::DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Largest accepted decoded width or height in pixels
    #[arg(long, env = "RMBG_MAX_IMAGE_DIMENSION", default_value_t = crate::config::DEFAULT_MAX_IMAGE_DIMENSION)]
    pub max_image_dimension: u32,

    /// Decoder allocation budget in bytes
    #[arg(long, env = "RMBG_MAX_DECODE_ALLOC_BYTES", default_value_t = crate::config::DEFAULT_MAX_DECODE_ALLOC_BYTES)]
    pub max_decode_alloc_bytes: u64,

    /// Number of images processed at once (0 = one per CPU core)
    #[arg(short = 'j', long, env = "RMBG_MAX_CONCURRENT_JOBS", default_value_t = 0)]
    pub jobs: usize,

    /// Allow cross-origin requests from any origin
    #[arg(long, env = "RMBG_CORS_PERMISSIVE")]
    pub cors_permissive: bool,

    /// Log format (console, compact, json with the tracing-json feature)
    #[arg(long, env = "RMBG_LOG_FORMAT", default_value = "console")]
    pub log_format: TracingFormat,

    /// Write logs to a daily-rolling file instead of the console
    #[cfg(feature = "tracing-files")]
    #[arg(long, env = "RMBG_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracing_guard = init_tracing(&cli).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let processor = {
        let removal = config.removal.clone();
        let span = spans::model_loading(
            &removal.model_spec.display_name(),
            &removal.backend_type.to_string(),
            &removal.execution_provider.to_string(),
        );
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            BackgroundRemovalProcessor::new(&removal)
        })
        .await
        .context("Model loading task failed")?
        .context("Failed to load background removal model")?
    };

    let state = AppState::new(Arc::new(processor), &config);
    let router = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        max_concurrent_jobs = config.max_concurrent_jobs,
        post_process_mask = config.removal.post_process_mask,
        "Listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Initialize tracing based on CLI flags; `RUST_LOG` overrides verbosity
fn init_tracing(cli: &Cli) -> Result<crate::tracing_config::TracingGuard> {
    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format);

    if let Ok(filter) = std::env::var("RUST_LOG") {
        if !filter.trim().is_empty() {
            config = config.with_env_filter(filter);
        }
    }

    #[cfg(feature = "tracing-files")]
    if let Some(path) = &cli.log_file {
        config = config.with_output(crate::tracing_config::TracingOutput::File(path.clone()));
    }

    config.init()
}

/// Resolve when the process receives Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests");
}

/// Display execution provider diagnostics
fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🚀 Execution Providers:");
    for (backend, name, available, description) in backends::list_providers() {
        let status = if available {
            "✅ Available"
        } else {
            "❌ Not Available"
        };
        println!("  • {backend}:{}: {status} - {description}", name.to_lowercase());
    }

    println!("\n📦 Models:");
    match crate::models::model_home() {
        Ok(home) => println!("  Model home: {}", home.display()),
        Err(e) => println!("  Model home: unavailable ({e})"),
    }
    for kind in crate::models::ModelKind::ALL {
        let [width, height] = kind.preprocessing_config().target_size;
        println!("  • {kind} ({width}x{height})");
    }
}
