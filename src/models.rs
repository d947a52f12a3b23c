//! Model catalogue and model file management
//!
//! The server runs U2-Net family segmentation models exported to ONNX. Each
//! known model carries its input size and normalisation constants; the model
//! file itself is looked up in the model home directory (`$U2NET_HOME`, or
//! `~/.u2net`) unless an explicit path is configured.

use crate::error::{Result, RmbgError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding the model home directory
pub const MODEL_HOME_ENV: &str = "U2NET_HOME";

/// Known segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// General purpose U2-Net (176 MB)
    U2net,
    /// Lightweight U2-Net (4.7 MB)
    U2netp,
    /// U2-Net trained for human segmentation
    #[serde(rename = "u2net_human_seg", alias = "u2net-human-seg")]
    U2netHumanSeg,
    /// Pruned U2-Net (43 MB)
    Silueta,
    /// IS-Net general use model (1024x1024 input)
    IsnetGeneralUse,
}

impl ModelKind {
    /// All models in the catalogue
    pub const ALL: [Self; 5] = [
        Self::U2net,
        Self::U2netp,
        Self::U2netHumanSeg,
        Self::Silueta,
        Self::IsnetGeneralUse,
    ];

    /// Canonical model name, also the file stem of the `.onnx` file
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::U2netHumanSeg => "u2net_human_seg",
            Self::Silueta => "silueta",
            Self::IsnetGeneralUse => "isnet-general-use",
        }
    }

    /// File name of the model inside the model home directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    /// Preprocessing constants the model was trained with
    #[must_use]
    pub fn preprocessing_config(self) -> PreprocessingConfig {
        match self {
            Self::U2net | Self::U2netp | Self::U2netHumanSeg | Self::Silueta => {
                PreprocessingConfig {
                    target_size: [320, 320],
                    normalization_mean: [0.485, 0.456, 0.406],
                    normalization_std: [0.229, 0.224, 0.225],
                }
            },
            Self::IsnetGeneralUse => PreprocessingConfig {
                target_size: [1024, 1024],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::U2net
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().replace('_', "-") == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|kind| kind.name()).collect();
                format!("unknown model '{s}' (known models: {})", known.join(", "))
            })
    }
}

/// Model selection: which catalogue entry, and optionally where its file lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    /// Explicit `.onnx` path, overriding the model home lookup
    pub path: Option<PathBuf>,
}

impl ModelSpec {
    /// Spec for a catalogue model stored in the model home directory
    #[must_use]
    pub fn named(kind: ModelKind) -> Self {
        Self { kind, path: None }
    }

    /// Spec for a catalogue model stored at an explicit path
    #[must_use]
    pub fn with_path<P: Into<PathBuf>>(kind: ModelKind, path: P) -> Self {
        Self {
            kind,
            path: Some(path.into()),
        }
    }

    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => format!(
                "{}:{}",
                self.kind,
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            None => self.kind.to_string(),
        }
    }

    /// Resolve the model file location
    ///
    /// # Errors
    /// - No explicit path and no home directory could be determined
    pub fn resolve_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let home = model_home()?;
        Ok(home.join(self.kind.file_name()))
    }
}

/// Directory that holds downloaded model files
///
/// # Errors
/// - Neither `$U2NET_HOME` nor the user's home directory is available
pub fn model_home() -> Result<PathBuf> {
    model_home_from(std::env::var_os(MODEL_HOME_ENV), dirs::home_dir())
}

fn model_home_from(env_value: Option<OsString>, home_dir: Option<PathBuf>) -> Result<PathBuf> {
    match env_value {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => home_dir.map(|home| home.join(".u2net")).ok_or_else(|| {
            RmbgError::invalid_config(format!(
                "Cannot determine model directory: set {MODEL_HOME_ENV} or pass an explicit model path"
            ))
        }),
    }
}

/// Preprocessing constants for a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input size `[width, height]`
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Model manager resolving a [`ModelSpec`] to a file on disk
#[derive(Debug, Clone)]
pub struct ModelManager {
    spec: ModelSpec,
    model_path: PathBuf,
    size_bytes: usize,
}

impl ModelManager {
    /// Create a new model manager from a model specification
    ///
    /// # Errors
    /// - Model path cannot be resolved
    /// - Model file does not exist or is not a regular file
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let model_path = spec.resolve_path()?;
        Self::with_model_file(spec.clone(), model_path)
    }

    fn with_model_file(spec: ModelSpec, model_path: PathBuf) -> Result<Self> {
        let metadata = fs::metadata(&model_path).map_err(|e| {
            let download_hint = format!(
                "download {} into the model directory",
                spec.kind.file_name()
            );
            let env_hint = format!("set {MODEL_HOME_ENV}");
            RmbgError::model_error_with_context(
                "locate",
                &model_path,
                &e.to_string(),
                &[download_hint.as_str(), env_hint.as_str(), "pass --model-path"],
            )
        })?;

        if !metadata.is_file() {
            return Err(RmbgError::model_error_with_context(
                "locate",
                &model_path,
                "path is not a file",
                &[],
            ));
        }

        Ok(Self {
            spec,
            model_path,
            size_bytes: usize::try_from(metadata.len()).unwrap_or(usize::MAX),
        })
    }

    /// Load model data
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.model_path).map_err(|e| {
            RmbgError::model_error_with_context("read", &self.model_path, &e.to_string(), &[])
        })
    }

    /// Get model information
    #[must_use]
    pub fn get_info(&self) -> ModelInfo {
        let [width, height] = self.spec.kind.preprocessing_config().target_size;
        ModelInfo {
            name: self.spec.kind.name().to_string(),
            size_bytes: self.size_bytes,
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        }
    }

    /// Get preprocessing configuration
    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        self.spec.kind.preprocessing_config()
    }

    /// Get the model file path
    #[must_use]
    pub fn get_model_path(&self) -> &Path {
        &self.model_path
    }

    /// Get the model specification this manager was built from
    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }
}
