//! Services that keep codec and upload handling out of the HTTP layer

pub mod io;
pub mod upload;

pub use io::{DecodeFailure, ImageIOService};
pub use upload::{output_filename, SupportedMediaType, Upload};
