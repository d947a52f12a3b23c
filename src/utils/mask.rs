//! Mask refinement: morphological opening, Gaussian blur and thresholding
//!
//! These operate on single-channel 8-bit masks and clean up the ragged,
//! semi-transparent edges segmentation models tend to predict.

use image::GrayImage;
use imageproc::{
    contrast::{threshold, ThresholdType},
    filter::gaussian_blur_f32,
    morphology::{grayscale_open, Mask},
};

/// Gaussian sigma used when refining masks
pub const DEFAULT_BLUR_SIGMA: f32 = 2.0;

/// Values below this become background, the rest foreground
pub const DEFAULT_THRESHOLD: u8 = 127;

/// Full refinement pipeline: opening, blur, then binarization
#[must_use]
pub fn postprocess_mask(mask: &GrayImage) -> GrayImage {
    let opened = morphological_opening(mask);
    let blurred = gaussian_blur(&opened, DEFAULT_BLUR_SIGMA);
    apply_threshold(&blurred, DEFAULT_THRESHOLD)
}

/// Grayscale erosion then dilation with a 3x3 cross; removes specks and
/// one-pixel strands
#[must_use]
pub fn morphological_opening(mask: &GrayImage) -> GrayImage {
    grayscale_open(mask, &Mask::diamond(1))
}

/// Gaussian blur; a non-positive sigma or an empty mask is returned unchanged
#[must_use]
pub fn gaussian_blur(mask: &GrayImage, sigma: f32) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 || sigma <= 0.0 {
        return mask.clone();
    }
    gaussian_blur_f32(mask, sigma)
}

/// Binarize: values below `threshold_value` become 0, the rest 255
#[must_use]
pub fn apply_threshold(mask: &GrayImage, threshold_value: u8) -> GrayImage {
    if threshold_value == 0 {
        return GrayImage::from_pixel(mask.width(), mask.height(), image::Luma([u8::MAX]));
    }
    // `Binary` keeps strictly greater values
    threshold(mask, threshold_value - 1, ThresholdType::Binary)
}
