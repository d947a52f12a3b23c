//! Request handlers

use super::{ApiError, AppState};
use crate::{
    pipeline::{self, ProcessedImage},
    services::Upload,
    tracing_config::spans,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, Instrument, Span};
use uuid::Uuid;

/// Name of the multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// Greeting returned by `GET /`
pub const WELCOME_MESSAGE: &str = "Welcome to the Remove Background API!";

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

/// `POST /rmbg`
///
/// # Errors
/// - See [`ApiError`]
pub async fn remove_background(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let span = spans::upload_request(&Uuid::new_v4());

    async move {
        let upload = read_upload(multipart?).await?;
        let processed = run_pipeline(&state, upload).await?;
        into_png_response(processed)
    }
    .instrument(span)
    .await
}

/// Read the `file` part, rejecting bad content types before the body is read
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        // Raw header, not the parsed mime, which lowercases type and subtype
        let content_type = field
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let filename = field.file_name().map(str::to_owned);
        let span = Span::current();
        span.record("filename", filename.as_deref().unwrap_or_default());
        span.record("content_type", content_type.as_deref().unwrap_or_default());

        pipeline::validate_content_type(content_type.as_deref())?;

        let bytes = field.bytes().await?;
        return Ok(Upload::new(bytes, content_type.as_deref(), filename.as_deref()));
    }

    Err(ApiError::InvalidRequest(format!(
        "no '{UPLOAD_FIELD}' field in multipart body"
    )))
}

/// Run decode → remove → encode on the blocking pool under a job permit
async fn run_pipeline(state: &AppState, upload: Upload) -> Result<ProcessedImage, ApiError> {
    let _permit = state
        .jobs
        .clone()
        .acquire_owned()
        .await
        .map_err(ApiError::processing)?;

    let remover = state.remover.clone();
    let options = state.options.clone();
    let span = Span::current();
    let size = upload.bytes.len();

    let processed = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        pipeline::process_upload(&upload, remover.as_ref(), &options)
    })
    .await
    .map_err(|join_error| {
        ApiError::ProcessingInternal(format!("removal worker failed: {join_error}"))
    })??;

    info!(
        input_bytes = size,
        output_bytes = processed.png.len(),
        filename = %processed.filename,
        "Background removed"
    );
    Ok(processed)
}

fn into_png_response(processed: ProcessedImage) -> Result<Response, ApiError> {
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename={}", processed.filename))
            .map_err(ApiError::processing)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        processed.png,
    )
        .into_response())
}
