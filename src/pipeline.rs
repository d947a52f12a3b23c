//! The per-request pipeline: validate → decode → remove → encode
//!
//! Every stage maps its failure onto an explicit [`ApiError`]. The functions
//! here are synchronous and CPU-bound; the HTTP handler runs them on the
//! blocking pool.

use crate::{
    processor::BackgroundRemover,
    server::ApiError,
    services::{DecodeFailure, ImageIOService, SupportedMediaType, Upload},
};
use image::{DynamicImage, Limits};
use instant::Instant;
use tracing::debug;

/// Encoded result ready to be sent back
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// PNG-encoded cut-out
    pub png: Vec<u8>,
    /// Attachment filename, `<base>_rmbg.png`
    pub filename: String,
}

/// Options applied to every upload
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Decoder limits
    pub decode_limits: Limits,
    /// Refine the mask before applying it
    pub post_process_mask: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            decode_limits: Limits::default(),
            post_process_mask: true,
        }
    }
}

/// Check the declared content type
///
/// # Errors
/// - [`ApiError::UnsupportedMediaType`] unless it is exactly `image/jpeg` or `image/png`
pub fn validate_content_type(content_type: Option<&str>) -> Result<SupportedMediaType, ApiError> {
    content_type
        .and_then(SupportedMediaType::from_content_type)
        .ok_or(ApiError::UnsupportedMediaType)
}

/// Decode uploaded bytes
///
/// # Errors
/// - [`ApiError::MalformedImage`] for unrecognised or corrupt data
/// - [`ApiError::DecodeInternal`] for every other decoder failure
pub fn decode_image(bytes: &[u8], limits: Limits) -> Result<DynamicImage, ApiError> {
    ImageIOService::decode(bytes, limits).map_err(|error| {
        match ImageIOService::classify_decode_error(&error) {
            DecodeFailure::Malformed => {
                debug!(%error, "Rejecting undecodable upload");
                ApiError::MalformedImage
            },
            DecodeFailure::Internal => ApiError::DecodeInternal(error.to_string()),
        }
    })
}

/// Run the whole pipeline for one upload
///
/// # Errors
/// - Any stage failure, as described on [`validate_content_type`] and
///   [`decode_image`]; removal and encoding failures become
///   [`ApiError::ProcessingInternal`]
pub fn process_upload(
    upload: &Upload,
    remover: &dyn BackgroundRemover,
    options: &PipelineOptions,
) -> Result<ProcessedImage, ApiError> {
    let media_type = validate_content_type(upload.content_type.as_deref())?;

    let decode_start = Instant::now();
    let image = decode_image(&upload.bytes, options.decode_limits.clone())?;
    debug!(
        %media_type,
        width = image.width(),
        height = image.height(),
        decode_ms = decode_start.elapsed().as_millis() as u64,
        "Upload decoded"
    );

    let output = remover
        .remove(image, options.post_process_mask)
        .map_err(ApiError::processing)?;

    let encode_start = Instant::now();
    let png = ImageIOService::encode_png(&output).map_err(ApiError::processing)?;
    debug!(
        bytes = png.len(),
        encode_ms = encode_start.elapsed().as_millis() as u64,
        "Result encoded"
    );

    Ok(ProcessedImage {
        png,
        filename: upload.output_filename(),
    })
}
