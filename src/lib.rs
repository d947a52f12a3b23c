#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unused_async)]

//! # rmbg-server
//!
//! An HTTP service that removes image backgrounds with U²-Net family
//! segmentation models, running on ONNX Runtime or the pure Rust Tract engine.
//!
//! ## Endpoints
//!
//! - `GET /` returns `{"message": "Welcome to the Remove Background API!"}`
//! - `POST /rmbg` takes a multipart upload with a JPEG or PNG in the `file`
//!   field and answers with a PNG whose background is transparent, named
//!   `<original base name>_rmbg.png`
//!
//! Every failure is answered with `{"detail": "..."}` and a fixed message;
//! internal causes are logged, never returned.
//!
//! ## Embedding
//!
//! The router is built from an [`AppState`] holding any [`BackgroundRemover`],
//! so the model can be swapped for a stub in tests:
//!
//! ```rust,no_run
//! use rmbg_server::{
//!     config::ServerConfig, create_router, AppState, BackgroundRemovalProcessor,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::builder().port(8080).build()?;
//! let processor = BackgroundRemovalProcessor::new(&config.removal)?;
//! let router = create_router(AppState::new(Arc::new(processor), &config));
//!
//! let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with CUDA and `CoreML` support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): the `rmbg-server` binary (argument parsing, subscriber setup)
//! - `tracing-json`, `tracing-files`: extra log formats and file output

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use config::{BackendType, ExecutionProvider, RemovalConfig, ServerConfig};
pub use error::{Result, RmbgError};
pub use inference::InferenceBackend;
pub use models::{ModelKind, ModelSpec};
pub use processor::{BackgroundRemovalProcessor, BackgroundRemover};
pub use server::{create_router, ApiError, AppState};
pub use types::SegmentationMask;
