//! Background removal processor
//!
//! [`BackgroundRemovalProcessor`] owns one initialized inference backend and
//! runs the full preprocess → infer → mask → cut-out pipeline for a decoded
//! image. The HTTP layer only sees it through the [`BackgroundRemover`] trait.

use crate::{
    backends,
    config::RemovalConfig,
    error::{Result, RmbgError},
    inference::InferenceBackend,
    models::ModelInfo,
    types::SegmentationMask,
    utils::ImagePreprocessor,
};
use image::{DynamicImage, GenericImageView};
use instant::Instant;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, span, Level};

/// Fallible image-to-image background removal
///
/// Implementations return an RGBA image with the same dimensions as the
/// input, whose alpha channel marks the foreground.
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background from `image`
    ///
    /// When `post_process_mask` is set the predicted mask is refined
    /// (opening, blur, threshold) before it is applied.
    ///
    /// # Errors
    /// - Inference or mask generation failures
    fn remove(&self, image: DynamicImage, post_process_mask: bool) -> Result<DynamicImage>;
}

/// Per-image stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingTimings {
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    pub postprocessing_ms: u64,
    pub total_ms: u64,
}

/// Background remover backed by a segmentation model
pub struct BackgroundRemovalProcessor {
    backend: Mutex<Box<dyn InferenceBackend>>,
    model_info: ModelInfo,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("model", &self.model_info.name)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create the configured backend and load its model
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Backend not compiled in
    /// - Backend initialization failures
    pub fn new(config: &RemovalConfig) -> Result<Self> {
        info!(
            model = %config.model_spec.display_name(),
            backend = %config.backend_type,
            provider = %config.execution_provider,
            "Initializing background removal processor"
        );
        let backend = backends::create_backend(config)?;
        Self::with_backend(backend, config)
    }

    /// Wrap an existing backend, initializing it if needed
    ///
    /// # Errors
    /// - Backend initialization failures
    pub fn with_backend(
        mut backend: Box<dyn InferenceBackend>,
        config: &RemovalConfig,
    ) -> Result<Self> {
        if let Some(load_time) = backend.initialize(config)? {
            debug!(load_ms = load_time.as_millis() as u64, "Model loaded");
        }
        let model_info = backend.model_info();
        info!(model = %model_info.name, "Background removal processor ready");

        Ok(Self {
            backend: Mutex::new(backend),
            model_info,
        })
    }

    /// Information about the loaded model
    #[must_use]
    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    fn lock_backend(&self) -> Result<MutexGuard<'_, Box<dyn InferenceBackend>>> {
        self.backend
            .lock()
            .map_err(|_| RmbgError::internal("Inference backend lock poisoned"))
    }

    /// Predict the foreground mask for `image` at its original size
    ///
    /// # Errors
    /// - Preprocessing, inference or mask generation failures
    pub fn predict_mask(
        &self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
    ) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();

        let preprocess_start = Instant::now();
        let preprocessing_config = self.lock_backend()?.preprocessing_config();
        let input_tensor = {
            let _span = span!(
                Level::DEBUG,
                "preprocessing",
                original_width = width,
                original_height = height
            )
            .entered();
            ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?
        };
        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;

        let inference_start = Instant::now();
        let output_tensor = {
            let _span = span!(Level::DEBUG, "inference", model = %self.model_info.name).entered();
            self.lock_backend()?.infer(&input_tensor)?
        };
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        SegmentationMask::from_tensor(&output_tensor)?.resize(width, height)
    }
}

impl BackgroundRemover for BackgroundRemovalProcessor {
    #[instrument(
        skip(self, image),
        fields(
            model = %self.model_info.name,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    fn remove(&self, image: DynamicImage, post_process_mask: bool) -> Result<DynamicImage> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let mask = self.predict_mask(&image, &mut timings)?;

        let postprocess_start = Instant::now();
        let (cutout, foreground_ratio) = {
            let _span = span!(Level::DEBUG, "postprocessing", post_process_mask).entered();
            let mask = if post_process_mask {
                mask.refine()?
            } else {
                mask
            };
            (mask.apply_to_image(&image)?, mask.foreground_ratio())
        };
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        debug!(
            preprocessing_ms = timings.preprocessing_ms,
            inference_ms = timings.inference_ms,
            postprocessing_ms = timings.postprocessing_ms,
            total_ms = timings.total_ms,
            foreground_ratio,
            "Background removed"
        );

        Ok(DynamicImage::ImageRgba8(cutout))
    }
}
