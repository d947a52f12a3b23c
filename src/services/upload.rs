//! Upload validation and output naming

use bytes::Bytes;
use std::fmt;

/// Suffix appended to the base name of every result file
pub const OUTPUT_SUFFIX: &str = "_rmbg.png";

/// Base name used when the upload carries no filename
pub const FALLBACK_BASE_NAME: &str = "image";

/// A single uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    /// Raw file content
    pub bytes: Bytes,
    /// Declared MIME type of the part
    pub content_type: Option<String>,
    /// Filename the client sent
    pub filename: Option<String>,
}

impl Upload {
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<&str>, filename: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_owned),
            filename: filename.map(str::to_owned),
        }
    }

    /// Attachment filename for the processed result
    #[must_use]
    pub fn output_filename(&self) -> String {
        output_filename(self.filename.as_deref())
    }
}

/// Upload content types the endpoint accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedMediaType {
    Jpeg,
    Png,
}

impl SupportedMediaType {
    /// Exact match against the accepted MIME types; no parameters, no case folding
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl fmt::Display for SupportedMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive `<base>_rmbg.png` from an uploaded filename
///
/// The base is the name with its last `.`-extension removed, or the whole
/// name when it has no `.`. Characters that cannot appear in a header value
/// (controls, quotes, separators used by `Content-Disposition`) are replaced
/// with `_`.
///
/// ```rust
/// use rmbg_server::services::output_filename;
///
/// assert_eq!(output_filename(Some("photo.jpg")), "photo_rmbg.png");
/// assert_eq!(output_filename(Some("archive.tar.gz")), "archive.tar_rmbg.png");
/// assert_eq!(output_filename(None), "image_rmbg.png");
/// ```
#[must_use]
pub fn output_filename(filename: Option<&str>) -> String {
    let name = filename.unwrap_or_default();
    let base = name.rsplit_once('.').map_or(name, |(base, _)| base);
    let sanitized: String = base.chars().map(sanitize_char).collect();

    if sanitized.is_empty() && name.is_empty() {
        format!("{FALLBACK_BASE_NAME}{OUTPUT_SUFFIX}")
    } else {
        format!("{sanitized}{OUTPUT_SUFFIX}")
    }
}

fn sanitize_char(c: char) -> char {
    if (c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\' | ',')) || c == ' ' {
        c
    } else {
        '_'
    }
}
