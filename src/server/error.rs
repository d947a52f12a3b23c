//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Detail returned for rejected content types
pub const DETAIL_UNSUPPORTED_MEDIA_TYPE: &str = "Invalid file type. Only JPEG and PNG are supported.";

/// Detail returned for bytes the decoder cannot read
pub const DETAIL_MALFORMED_IMAGE: &str = "Invalid image file.";

/// Detail returned for every server-side failure
pub const DETAIL_INTERNAL: &str = "Internal server error.";

/// Detail returned when the multipart body has no usable `file` part
pub const DETAIL_INVALID_REQUEST: &str = "A single file upload in the 'file' field is required.";

/// Detail returned when the body exceeds the upload limit
pub const DETAIL_PAYLOAD_TOO_LARGE: &str = "Uploaded file is too large.";

/// Every way a `/rmbg` request can fail
///
/// The carried strings describe the cause for the server log only; clients
/// receive the fixed [`ApiError::detail`] text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unsupported media type")]
    UnsupportedMediaType,

    #[error("malformed image")]
    MalformedImage,

    #[error("failed to decode image: {0}")]
    DecodeInternal(String),

    #[error("failed to process image: {0}")]
    ProcessingInternal(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("payload too large")]
    PayloadTooLarge,
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType | Self::MalformedImage => StatusCode::BAD_REQUEST,
            Self::DecodeInternal(_) | Self::ProcessingInternal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Client-facing message
    #[must_use]
    pub fn detail(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => DETAIL_UNSUPPORTED_MEDIA_TYPE,
            Self::MalformedImage => DETAIL_MALFORMED_IMAGE,
            Self::DecodeInternal(_) | Self::ProcessingInternal(_) => DETAIL_INTERNAL,
            Self::InvalidRequest(_) => DETAIL_INVALID_REQUEST,
            Self::PayloadTooLarge => DETAIL_PAYLOAD_TOO_LARGE,
        }
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::DecodeInternal(_) | Self::ProcessingInternal(_))
    }

    pub fn processing<E: std::fmt::Display>(error: E) -> Self {
        Self::ProcessingInternal(error.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(error: axum::extract::multipart::MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::InvalidRequest(error.body_text())
        }
    }
}

impl From<axum::extract::multipart::MultipartRejection> for ApiError {
    fn from(rejection: axum::extract::multipart::MultipartRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (self.status_code(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::UnsupportedMediaType.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MalformedImage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::DecodeInternal("limits".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::ProcessingInternal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::InvalidRequest("no file".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_internal_cause_is_not_exposed() {
        let (status, body) =
            body_json(ApiError::ProcessingInternal("CUDA out of memory".into())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "Internal server error." }));
    }

    #[tokio::test]
    async fn test_media_type_body() {
        let (status, body) = body_json(ApiError::UnsupportedMediaType).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "detail": "Invalid file type. Only JPEG and PNG are supported." })
        );
    }
}
