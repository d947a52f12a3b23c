//! Tract backend implementation for segmentation models
//!
//! Tract is a pure Rust inference engine: no C++ runtime to ship, no FFI
//! boundary, CPU only.

use crate::config::RemovalConfig;
use crate::error::{Result, RmbgError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the optimized runnable Tract model
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
    initialized: bool,
}

impl TractBackend {
    /// List Tract execution providers (`(name, available, description)`)
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cpu_count = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(1);
        log::debug!("🔍 Tract Backend System Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - CPU cores: {cpu_count}");

        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a Tract backend for the given model
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
            initialized: false,
        }
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self, _config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_data = self.model_manager.load_model()?;
        let model_info = self.model_manager.get_info();
        let (batch, channels, height, width) = model_info.input_shape;

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {}", model_info.name);
        #[allow(clippy::cast_precision_loss)]
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        // Exported models leave the batch dimension symbolic; pin the full shape
        // so Tract can optimize the graph
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| RmbgError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([batch, channels, height, width]).into())
            .map_err(|e| RmbgError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| RmbgError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| RmbgError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RmbgError::inference("Tract model not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🔮 Running Tract inference on {:?}", input.shape());

        // Go through a flat slice so the tensor does not depend on Tract's ndarray version
        let contiguous = input.as_standard_layout();
        let input_data = contiguous
            .as_slice()
            .ok_or_else(|| RmbgError::inference("Input tensor is not contiguous"))?;
        let input_tensor = Tensor::from_shape::<f32>(input.shape(), input_data)
            .map_err(|e| RmbgError::inference(format!("Failed to build input tensor: {e}")))?;
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| RmbgError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| RmbgError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor
            .to_array_view::<f32>()
            .map_err(|e| RmbgError::inference(format!("Failed to convert output tensor: {e}")))?;

        let output_shape = output_data.shape();
        if output_shape.len() != 4 {
            return Err(RmbgError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_array = Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_data.iter().copied().collect(),
        )
        .map_err(|e| RmbgError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "✅ Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );

        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager.get_info().input_shape
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model_manager.get_preprocessing_config()
    }

    fn model_info(&self) -> ModelInfo {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelKind, ModelSpec};

    fn manager_with_bytes(kind: ModelKind, bytes: &[u8]) -> (tempfile::TempDir, ModelManager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(kind.file_name());
        std::fs::write(&path, bytes).unwrap();
        let manager = ModelManager::from_spec(&ModelSpec::with_path(kind, &path)).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_tract_backend_creation() {
        let (_dir, manager) = manager_with_bytes(ModelKind::IsnetGeneralUse, b"onnx");
        let backend = TractBackend::with_model_manager(manager);

        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 1024, 1024));
        assert_eq!(backend.model_info().output_shape, (1, 1, 1024, 1024));
    }

    #[test]
    fn test_invalid_model_fails_initialization() {
        let (_dir, manager) = manager_with_bytes(ModelKind::U2netp, b"definitely not protobuf");
        let mut backend = TractBackend::with_model_manager(manager);

        let result = backend.initialize(&RemovalConfig::default());
        assert!(matches!(result, Err(RmbgError::Model(_))));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_infer_requires_initialization() {
        let (_dir, manager) = manager_with_bytes(ModelKind::U2netp, b"onnx");
        let mut backend = TractBackend::with_model_manager(manager);
        let input = Array4::<f32>::zeros((1, 3, 320, 320));

        assert!(backend.infer(&input).is_err());
    }

    #[test]
    fn test_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].0, "CPU");
        assert!(providers[0].1);
    }
}
