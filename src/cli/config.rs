//! Conversion of CLI arguments into a validated `ServerConfig`

use crate::cli::main_impl::Cli;
use crate::{
    config::{BackendType, ExecutionProvider, ServerConfig},
    models::{ModelKind, ModelSpec},
};
use anyhow::{Context, Result};

/// Convert CLI arguments to `ServerConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build `ServerConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServerConfig> {
        let kind: ModelKind = cli
            .model
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid model name")?;
        let model_spec = match &cli.model_path {
            Some(path) => ModelSpec::with_path(kind, path),
            None => ModelSpec::named(kind),
        };

        let (backend_type, execution_provider) =
            Self::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider format")?;

        ServerConfig::builder()
            .host(cli.host)
            .port(cli.port)
            .model_spec(model_spec)
            .backend_type(backend_type)
            .execution_provider(execution_provider)
            .num_threads(cli.threads)
            .post_process_mask(!cli.no_post_process)
            .max_upload_bytes(cli.max_upload_bytes)
            .max_image_dimension(cli.max_image_dimension)
            .max_decode_alloc_bytes(cli.max_decode_alloc_bytes)
            .max_concurrent_jobs(cli.jobs)
            .cors_permissive(cli.cors_permissive)
            .build()
            .context("Invalid configuration")
    }

    /// Parse `backend:provider`, or a bare backend name meaning `backend:auto`
    pub(crate) fn parse_provider_string(value: &str) -> Result<(BackendType, ExecutionProvider)> {
        let (backend, provider) = value.split_once(':').unwrap_or((value, "auto"));
        let backend_type: BackendType = backend.parse().map_err(anyhow::Error::msg)?;
        let execution_provider: ExecutionProvider =
            provider.parse().map_err(anyhow::Error::msg)?;
        Ok((backend_type, execution_provider))
    }
}
