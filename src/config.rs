//! Configuration types for the background removal server

use crate::error::{Result, RmbgError};
use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default upload body limit (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Default maximum decoded width or height
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 16_384;

/// Default decoder allocation budget (512 MiB)
pub const DEFAULT_MAX_DECODE_ALLOC_BYTES: u64 = 512 * 1024 * 1024;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(format!(
                "unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            )),
        }
    }
}

/// Inference backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else {
            Self::Tract
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(format!("unknown backend '{other}' (expected onnx or tract)")),
        }
    }
}

/// Configuration for the background removal step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Model specification
    pub model_spec: ModelSpec,

    /// Inference backend
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Refine the predicted mask (opening, blur, threshold) before cutting out
    pub post_process_mask: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            post_process_mask: true,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    pub host: IpAddr,

    /// Port to bind
    pub port: u16,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,

    /// Largest accepted decoded width or height in pixels
    pub max_image_dimension: u32,

    /// Decoder allocation budget in bytes
    pub max_decode_alloc_bytes: u64,

    /// Number of removal pipelines allowed to run at once
    pub max_concurrent_jobs: usize,

    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,

    /// Background removal settings
    pub removal: RemovalConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            max_decode_alloc_bytes: DEFAULT_MAX_DECODE_ALLOC_BYTES,
            max_concurrent_jobs: default_concurrency(),
            cors_permissive: false,
            removal: RemovalConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4)
}

impl ServerConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use rmbg_server::config::ServerConfig;
    ///
    /// let config = ServerConfig::builder()
    ///     .port(8080)
    ///     .post_process_mask(false)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.port, 8080);
    /// assert!(!config.removal.post_process_mask);
    /// ```
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Socket address the server binds to
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Decoder limits derived from this configuration
    #[must_use]
    pub fn decode_limits(&self) -> image::Limits {
        let mut limits = image::Limits::default();
        limits.max_image_width = Some(self.max_image_dimension);
        limits.max_image_height = Some(self.max_image_dimension);
        limits.max_alloc = Some(self.max_decode_alloc_bytes);
        limits
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Zero upload limit, image dimension, allocation budget or job count
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(RmbgError::config_value_error(
                "max upload bytes",
                self.max_upload_bytes,
                ">= 1",
            ));
        }
        if self.max_image_dimension == 0 {
            return Err(RmbgError::config_value_error(
                "max image dimension",
                self.max_image_dimension,
                ">= 1",
            ));
        }
        if self.max_decode_alloc_bytes == 0 {
            return Err(RmbgError::config_value_error(
                "max decode allocation",
                self.max_decode_alloc_bytes,
                ">= 1",
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(RmbgError::config_value_error(
                "max concurrent jobs",
                self.max_concurrent_jobs,
                ">= 1",
            ));
        }
        if self.removal.backend_type == BackendType::Tract
            && self.removal.execution_provider != ExecutionProvider::Auto
            && self.removal.execution_provider != ExecutionProvider::Cpu
        {
            return Err(RmbgError::invalid_config(format!(
                "Tract backend only supports the CPU execution provider, got '{}'",
                self.removal.execution_provider
            )));
        }
        Ok(())
    }
}

/// Builder for `ServerConfig`
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    #[must_use]
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn max_image_dimension(mut self, pixels: u32) -> Self {
        self.config.max_image_dimension = pixels;
        self
    }

    #[must_use]
    pub fn max_decode_alloc_bytes(mut self, bytes: u64) -> Self {
        self.config.max_decode_alloc_bytes = bytes;
        self
    }

    /// Set the number of concurrent removal jobs (0 = one per CPU)
    #[must_use]
    pub fn max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.config.max_concurrent_jobs = if jobs == 0 {
            default_concurrency()
        } else {
            jobs
        };
        self
    }

    #[must_use]
    pub fn cors_permissive(mut self, permissive: bool) -> Self {
        self.config.cors_permissive = permissive;
        self
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.removal.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.removal.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.removal.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.removal.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.removal.inter_threads = threads;
        self
    }

    /// Set both intra and inter threads (inter = intra / 2, minimum 1; 0 = auto)
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.removal.intra_threads = threads;
        self.config.removal.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    #[must_use]
    pub fn post_process_mask(mut self, enabled: bool) -> Self {
        self.config.removal.post_process_mask = enabled;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any check in [`ServerConfig::validate`] fails
    pub fn build(self) -> Result<ServerConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
