//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use instant::Duration;
use ndarray::Array4;
use rmbg_server::{
    config::{RemovalConfig, ServerConfig},
    models::{ModelInfo, PreprocessingConfig},
    processor::BackgroundRemover,
    server::{create_router, AppState},
    InferenceBackend, Result, RmbgError,
};
use std::io::Cursor;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub const BOUNDARY: &str = "rmbg-test-boundary";

/// Returns the input with an opaque alpha channel
#[derive(Default)]
pub struct IdentityRemover {
    pub calls: AtomicUsize,
}

impl IdentityRemover {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BackgroundRemover for IdentityRemover {
    fn remove(&self, image: DynamicImage, _post_process_mask: bool) -> Result<DynamicImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DynamicImage::ImageRgba8(image.to_rgba8()))
    }
}

/// Fails with a message that must never reach the client
pub struct FailingRemover;

pub const SECRET_CAUSE: &str = "model session crashed at /opt/secret/path";

impl BackgroundRemover for FailingRemover {
    fn remove(&self, _image: DynamicImage, _post_process_mask: bool) -> Result<DynamicImage> {
        Err(RmbgError::inference(SECRET_CAUSE))
    }
}

/// Panics inside the blocking worker
pub struct PanickingRemover;

impl BackgroundRemover for PanickingRemover {
    fn remove(&self, _image: DynamicImage, _post_process_mask: bool) -> Result<DynamicImage> {
        panic!("{SECRET_CAUSE}");
    }
}

/// Sleeps while tracking how many calls overlap
#[derive(Default)]
pub struct SlowRemover {
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl BackgroundRemover for SlowRemover {
    fn remove(&self, image: DynamicImage, _post_process_mask: bool) -> Result<DynamicImage> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(50));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(DynamicImage::ImageRgba8(image.to_rgba8()))
    }
}

/// Inference backend predicting the left half of the frame as foreground
#[derive(Debug, Default)]
pub struct LeftHalfBackend {
    initialized: bool,
}

impl InferenceBackend for LeftHalfBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let (_, _, height, width) = input.dim();
        Ok(Array4::from_shape_fn((1, 1, height, width), |(_, _, _, x)| {
            if x < width / 2 {
                1.0
            } else {
                0.0
            }
        }))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, 64, 64)
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [64, 64],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "left-half".to_string(),
            size_bytes: 0,
            input_shape: (1, 3, 64, 64),
            output_shape: (1, 1, 64, 64),
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

pub fn router_with(remover: Arc<dyn BackgroundRemover>) -> Router {
    router_with_config(remover, &ServerConfig::default())
}

pub fn router_with_config(remover: Arc<dyn BackgroundRemover>, config: &ServerConfig) -> Router {
    create_router(AppState::new(remover, config))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    buffer
}

/// 1x1 red RGB PNG
pub fn tiny_png() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(1, 1, Rgb([255, 0, 0])));
    encode(&image, ImageFormat::Png)
}

pub fn photo_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 4) as u8, (y * 4) as u8, 128])
    }));
    encode(&image, ImageFormat::Jpeg)
}

/// Minimal GIF89a (1x1, single black pixel)
pub fn tiny_gif() -> Vec<u8> {
    vec![
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02,
        0x02, 0x44, 0x01, 0x00, 0x3b,
    ]
}

/// A multipart part; `None` fields omit the corresponding header parameter
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Self {
            name: "file",
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{filename}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/rmbg")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
