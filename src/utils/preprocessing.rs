//! Image to tensor conversion for segmentation models

use crate::{
    error::{Result, RmbgError},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

/// Smallest divisor used when scaling by the brightest channel value
const MIN_PIXEL_SCALE: f32 = 1e-6;

/// Converts decoded images into normalized NCHW input tensors
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image for inference
    ///
    /// The image is converted to RGB and stretched to the model's input size
    /// with a Lanczos3 filter. Channel values are divided by the brightest
    /// value in the resized image and then normalized with the model's
    /// mean and standard deviation.
    ///
    /// # Errors
    /// - The model input size is zero
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if target_width == 0 || target_height == 0 {
            return Err(RmbgError::processing_stage_error(
                "preprocessing",
                "model input size must be non-zero",
                Some(&format!("{target_width}x{target_height}")),
            ));
        }

        let rgb_image = image.to_rgb8();
        let resized = image::imageops::resize(
            &rgb_image,
            target_width,
            target_height,
            FilterType::Lanczos3,
        );

        Ok(Self::image_to_tensor(&resized, preprocessing_config))
    }

    /// Convert a resized RGB image to a normalized tensor
    fn image_to_tensor(image: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let max_value = image
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(0.0, f32::from)
            .max(MIN_PIXEL_SCALE);

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / max_value;
                if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                    *slot = (value - mean[channel]) / std[channel];
                }
            }
        }

        tensor
    }
}
