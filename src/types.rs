//! Core types for background removal operations

use crate::error::{Result, RmbgError};
use crate::utils::mask;
use image::{imageops::FilterType, DynamicImage, GrayImage, RgbaImage};
use ndarray::Array4;

/// Single-channel 8-bit foreground mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Mask values (0-255), row-major
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Build a mask from a model output tensor
    ///
    /// Channel 0 of the first batch item is min-max normalized to `[0, 1]`
    /// and scaled to 8 bits. A flat prediction yields an all-zero mask.
    ///
    /// # Errors
    /// - Empty batch or channel dimension
    pub fn from_tensor(tensor: &Array4<f32>) -> Result<Self> {
        let (batch, channels, height, width) = tensor.dim();
        if batch == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(RmbgError::processing_stage_error(
                "mask generation",
                "model output tensor is empty",
                Some(&format!("{:?}", tensor.shape())),
            ));
        }

        let prediction = tensor.slice(ndarray::s![0, 0, .., ..]);
        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        let data = prediction
            .iter()
            .map(|&v| {
                let normalized = if range > 0.0 { (v - min) / range } else { 0.0 };
                (normalized.clamp(0.0, 1.0) * 255.0) as u8
            })
            .collect();

        Ok(Self::new(data, (width as u32, height as u32)))
    }

    /// Create from a grayscale image
    #[must_use]
    pub fn from_image(image: GrayImage) -> Self {
        let dimensions = image.dimensions();
        Self::new(image.into_raw(), dimensions)
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            RmbgError::processing(format!(
                "Mask data length {} does not match {width}x{height}",
                self.data.len()
            ))
        })
    }

    /// Resize with a Lanczos3 filter
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        if self.dimensions == (width, height) {
            return Ok(self.clone());
        }
        let image = self.to_image()?;
        let resized = image::imageops::resize(&image, width, height, FilterType::Lanczos3);
        Ok(Self::from_image(resized))
    }

    /// Apply opening, blur and threshold to get a crisp binary mask
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn refine(&self) -> Result<Self> {
        let image = self.to_image()?;
        Ok(Self::from_image(mask::postprocess_mask(&image)))
    }

    /// Cut the image out along the mask
    ///
    /// The result keeps the image's dimensions and RGB values and takes its
    /// alpha from the mask; fully transparent pixels are set to black.
    ///
    /// # Errors
    /// - Mask and image dimensions differ
    pub fn apply_to_image(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let rgba_image = image.to_rgba8();
        let (width, height) = rgba_image.dimensions();

        let pixel_count = width as usize * height as usize;
        if self.dimensions != (width, height) || self.data.len() != pixel_count {
            return Err(RmbgError::processing_stage_error(
                "cutout",
                "mask dimensions do not match image",
                Some(&format!(
                    "mask {}x{}, image {width}x{height}",
                    self.dimensions.0, self.dimensions.1
                )),
            ));
        }

        let mut result = rgba_image;
        for (pixel, &alpha) in result.pixels_mut().zip(self.data.iter()) {
            *pixel = if alpha > 0 {
                image::Rgba([pixel[0], pixel[1], pixel[2], alpha])
            } else {
                image::Rgba([0, 0, 0, 0])
            };
        }

        Ok(result)
    }

    /// Fraction of pixels with any foreground coverage
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v > 0).count();
        foreground as f32 / self.data.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_from_tensor_min_max_normalizes() {
        let tensor = Array4::from_shape_vec((1, 1, 1, 3), vec![2.0, 3.0, 4.0]).unwrap();
        let mask = SegmentationMask::from_tensor(&tensor).unwrap();

        assert_eq!(mask.dimensions, (3, 1));
        assert_eq!(mask.data, vec![0, 127, 255]);
    }

    #[test]
    fn test_from_tensor_uses_first_channel_only() {
        let mut tensor = Array4::<f32>::zeros((1, 2, 1, 2));
        tensor[[0, 0, 0, 1]] = 1.0;
        tensor[[0, 1, 0, 0]] = 100.0;
        let mask = SegmentationMask::from_tensor(&tensor).unwrap();

        assert_eq!(mask.data, vec![0, 255]);
    }

    #[test]
    fn test_flat_prediction_gives_empty_mask() {
        let tensor = Array4::<f32>::from_elem((1, 1, 4, 4), 0.7);
        let mask = SegmentationMask::from_tensor(&tensor).unwrap();
        assert!(mask.data.iter().all(|&v| v == 0));
        assert!(mask.foreground_ratio().abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_tensor_is_rejected() {
        let tensor = Array4::<f32>::zeros((1, 0, 4, 4));
        assert!(SegmentationMask::from_tensor(&tensor).is_err());
    }

    #[test]
    fn test_resize_changes_dimensions() {
        let mask = SegmentationMask::new(vec![255; 16], (4, 4));
        let resized = mask.resize(10, 6).unwrap();

        assert_eq!(resized.dimensions, (10, 6));
        assert_eq!(resized.data.len(), 60);
    }

    #[test]
    fn test_to_image_rejects_bad_length() {
        let mask = SegmentationMask::new(vec![0; 3], (2, 2));
        assert!(mask.to_image().is_err());
    }

    #[test]
    fn test_apply_to_image_sets_alpha() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(2, 1, Rgb([10, 20, 30])));
        let mask = SegmentationMask::new(vec![0, 200], (2, 1));
        let cutout = mask.apply_to_image(&image).unwrap();

        assert_eq!(cutout.dimensions(), (2, 1));
        assert_eq!(cutout.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(cutout.get_pixel(1, 0).0, [10, 20, 30, 200]);
    }

    #[test]
    fn test_apply_to_image_dimension_mismatch() {
        let image = DynamicImage::new_rgb8(3, 3);
        let mask = SegmentationMask::new(vec![0; 4], (2, 2));
        assert!(mask.apply_to_image(&image).is_err());
    }

    #[test]
    fn test_apply_to_image_rejects_short_data() {
        let image = DynamicImage::new_rgb8(3, 2);
        let mask = SegmentationMask::new(vec![255; 5], (3, 2));
        assert!(mask.apply_to_image(&image).is_err());

        let mask = SegmentationMask::new(vec![255; 6], (3, 2));
        assert!(mask.apply_to_image(&image).is_ok());
    }

    #[test]
    fn test_refine_is_binary() {
        let mask = SegmentationMask::new((0..=255).collect(), (16, 16));
        let refined = mask.refine().unwrap();
        assert!(refined.data.iter().all(|&v| v == 0 || v == 255));
    }
}
