//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (high performance, GPU acceleration)
//! - Tract backend (pure Rust, no external dependencies)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

use crate::{
    config::{BackendType, RemovalConfig},
    error::{Result, RmbgError},
    inference::InferenceBackend,
    models::ModelManager,
};

/// Create an uninitialized backend of the configured type for the configured model
///
/// # Errors
/// - Model file cannot be located
/// - The requested backend was not compiled in
pub fn create_backend(config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
    let model_manager = ModelManager::from_spec(&config.model_spec)?;
    create_backend_with_manager(config.backend_type, model_manager)
}

/// Create an uninitialized backend of the given type around an existing model manager
///
/// # Errors
/// - The requested backend was not compiled in
#[allow(unused_variables)]
pub fn create_backend_with_manager(
    backend_type: BackendType,
    model_manager: ModelManager,
) -> Result<Box<dyn InferenceBackend>> {
    match backend_type {
        #[cfg(feature = "onnx")]
        BackendType::Onnx => Ok(Box::new(OnnxBackend::with_model_manager(model_manager))),
        #[cfg(feature = "tract")]
        BackendType::Tract => Ok(Box::new(TractBackend::with_model_manager(model_manager))),
        #[allow(unreachable_patterns)]
        other => Err(RmbgError::invalid_config(format!(
            "Backend '{other}' is not available in this build (enable the '{other}' feature)"
        ))),
    }
}

/// List execution providers for every compiled-in backend
///
/// Each entry is `(backend, provider, available, description)`.
#[must_use]
pub fn list_providers() -> Vec<(BackendType, String, bool, String)> {
    #[allow(unused_mut)]
    let mut providers = Vec::new();

    #[cfg(feature = "onnx")]
    for (name, available, description) in OnnxBackend::list_providers() {
        providers.push((BackendType::Onnx, name, available, description));
    }

    #[cfg(feature = "tract")]
    for (name, available, description) in TractBackend::list_providers() {
        providers.push((BackendType::Tract, name, available, description));
    }

    providers
}
