//! In-memory image decoding and encoding
//!
//! Uploads never touch the filesystem: bytes are decoded straight from the
//! request body and the result is encoded into a buffer for the response.

use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Limits};
use std::io::{Cursor, ErrorKind};

/// How a decode failure should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The bytes are not an image the codec recognises, or are corrupt
    Malformed,
    /// Anything else: limits exceeded, parameter errors, unexpected I/O
    Internal,
}

/// Service for image decoding and encoding from memory
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image, sniffing its format from the content
    ///
    /// The declared content type of the upload is not consulted. Decoding is
    /// bounded by `limits`.
    ///
    /// # Errors
    /// - Unrecognised or corrupt data
    /// - A limit in `limits` is exceeded
    pub fn decode(bytes: &[u8], limits: Limits) -> Result<DynamicImage, ImageError> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        reader.limits(limits);
        let image = reader.decode()?;

        log::debug!(
            "Decoded {}x{} {:?} image from {} bytes",
            image.width(),
            image.height(),
            image.color(),
            bytes.len()
        );
        Ok(image)
    }

    /// Classify a decode error as a client or server problem
    #[must_use]
    pub fn classify_decode_error(error: &ImageError) -> DecodeFailure {
        match error {
            ImageError::Unsupported(_) | ImageError::Decoding(_) => DecodeFailure::Malformed,
            ImageError::IoError(io_error)
                if matches!(
                    io_error.kind(),
                    ErrorKind::UnexpectedEof | ErrorKind::InvalidData
                ) =>
            {
                DecodeFailure::Malformed
            },
            _ => DecodeFailure::Internal,
        }
    }

    /// Encode an image as PNG into a new buffer
    ///
    /// # Errors
    /// - The PNG encoder rejects the image
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
        let mut buffer = Vec::new();
        image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }
}
