//! Mock inference backend for testing the processor without model files

use crate::{
    config::RemovalConfig,
    error::{Result, RmbgError},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Mock backend predicting a centered rectangle of foreground
///
/// The predicted foreground covers the middle half of the model input in both
/// directions with values of 0.9 on a 0.1 background, so min-max
/// normalisation maps it to a clean 0/255 mask.
#[derive(Debug, Clone)]
pub(crate) struct MockBackend {
    initialized: bool,
    model_info: ModelInfo,
    preprocessing_config: PreprocessingConfig,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
    uniform_output: Option<f32>,
}

impl MockBackend {
    /// Create a mock backend with a 32x32 model input
    pub(crate) fn new() -> Self {
        Self {
            initialized: false,
            model_info: ModelInfo {
                name: "mock-model".to_string(),
                size_bytes: 1024,
                input_shape: (1, 3, 32, 32),
                output_shape: (1, 1, 32, 32),
            },
            preprocessing_config: PreprocessingConfig {
                target_size: [32, 32],
                normalization_mean: [0.485, 0.456, 0.406],
                normalization_std: [0.229, 0.224, 0.225],
            },
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
            uniform_output: None,
        }
    }

    /// Create a mock backend that fails during initialization
    pub(crate) fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Create a mock backend that fails during inference
    pub(crate) fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Create a mock backend whose prediction is the same value everywhere
    pub(crate) fn new_uniform(value: f32) -> Self {
        let mut backend = Self::new();
        backend.uniform_output = Some(value);
        backend
    }

    /// Shared handle to the call history, usable after the backend is boxed
    pub(crate) fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_mock_output(&self) -> Array4<f32> {
        let (_, _, height, width) = self.model_info.output_shape;
        if let Some(value) = self.uniform_output {
            return Array4::<f32>::from_elem((1, 1, height, width), value);
        }

        Array4::<f32>::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let inside_y = y >= height / 4 && y < height - height / 4;
            let inside_x = x >= width / 4 && x < width - width / 4;
            if inside_x && inside_y {
                0.9
            } else {
                0.1
            }
        })
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.should_fail_init {
            return Err(RmbgError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(RmbgError::inference("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(RmbgError::inference(
                "Mock backend inference failed: CUDA out of memory",
            ));
        }

        let (batch, channels, height, width) = self.model_info.input_shape;
        if input.dim() != (batch, channels, height, width) {
            return Err(RmbgError::inference(format!(
                "Unexpected input shape {:?}",
                input.shape()
            )));
        }

        Ok(self.generate_mock_output())
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.input_shape
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.preprocessing_config.clone()
    }

    fn model_info(&self) -> ModelInfo {
        self.model_info.clone()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_lifecycle() {
        let mut backend = MockBackend::new();
        let history = backend.call_history();
        let input = Array4::<f32>::zeros((1, 3, 32, 32));

        assert!(backend.infer(&input).is_err());
        backend.initialize(&RemovalConfig::default()).unwrap();
        let output = backend.infer(&input).unwrap();

        assert_eq!(output.shape(), &[1, 1, 32, 32]);
        assert!((output[[0, 0, 16, 16]] - 0.9).abs() < f32::EPSILON);
        assert!((output[[0, 0, 0, 0]] - 0.1).abs() < f32::EPSILON);
        assert_eq!(
            history.lock().unwrap().as_slice(),
            &["infer", "initialize", "infer"]
        );
    }

    #[test]
    fn test_mock_backend_failures() {
        let mut backend = MockBackend::new_failing_init();
        assert!(backend.initialize(&RemovalConfig::default()).is_err());

        let mut backend = MockBackend::new_failing_inference();
        backend.initialize(&RemovalConfig::default()).unwrap();
        assert!(backend.infer(&Array4::<f32>::zeros((1, 3, 32, 32))).is_err());
    }

    #[test]
    fn test_mock_backend_rejects_wrong_shape() {
        let mut backend = MockBackend::new();
        backend.initialize(&RemovalConfig::default()).unwrap();
        assert!(backend.infer(&Array4::<f32>::zeros((1, 3, 64, 64))).is_err());
    }
}
