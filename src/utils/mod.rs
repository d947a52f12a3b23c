//! Image utilities shared by the removal pipeline

pub mod mask;
pub mod preprocessing;

pub use mask::postprocess_mask;
pub use preprocessing::ImagePreprocessor;
