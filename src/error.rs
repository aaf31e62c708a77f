//! Error types for volview.

use std::path::PathBuf;

use thiserror::Error;

use crate::shader::ShaderStage;

/// Failures while decoding a `.vol` file.
///
/// These never escape [`VolumeDataset::load`](crate::VolumeDataset::load),
/// which logs them and falls back to the placeholder dataset.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// The file could not be read.
    #[error("I/O error reading volume: {0}")]
    Io(#[from] std::io::Error),

    /// The file is shorter than the fixed header.
    #[error("volume header truncated: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },
}

/// Fatal errors raised while starting or running the viewer.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// The windowing system refused to create the event loop or window.
    #[error("window error: {0}")]
    Window(String),

    /// wgpu could not create a surface for the window.
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    /// No adapter satisfied the surface requirements.
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    /// The adapter refused to create a logical device.
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// A shader stage failed to compile or link.
    #[error("{stage} shader '{label}' failed to compile:\n{log}")]
    ShaderCompilation {
        stage: ShaderStage,
        label: String,
        log: String,
    },

    /// A shader source file could not be read.
    #[error("could not read shader source {path}: {source}")]
    ShaderSource {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file could not be read.
    #[error("could not read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ViewerConfig`](crate::ViewerConfig).
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The event loop terminated abnormally.
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// A specialized Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
