//! Shared application state

use crate::{config::ServerConfig, pipeline::PipelineOptions, processor::BackgroundRemover};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// State handed to every handler
///
/// Cloning is cheap: the remover and the job semaphore are shared.
#[derive(Clone)]
pub struct AppState {
    /// Background removal engine, read-only after startup
    pub remover: Arc<dyn BackgroundRemover>,
    /// Options applied to every upload
    pub options: Arc<PipelineOptions>,
    /// Bounds the number of pipelines running at once
    pub jobs: Arc<Semaphore>,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,
}

impl AppState {
    /// Build state from the server configuration
    pub fn new(remover: Arc<dyn BackgroundRemover>, config: &ServerConfig) -> Self {
        Self {
            remover,
            options: Arc::new(PipelineOptions {
                decode_limits: config.decode_limits(),
                post_process_mask: config.removal.post_process_mask,
            }),
            jobs: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            max_upload_bytes: config.max_upload_bytes,
            cors_permissive: config.cors_permissive,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("options", &self.options)
            .field("available_jobs", &self.jobs.available_permits())
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("cors_permissive", &self.cors_permissive)
            .finish_non_exhaustive()
    }
}
