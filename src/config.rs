//! Viewer configuration loaded from TOML.
//!
//! Every field has a default, so a config file only needs the values it
//! overrides. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::camera::{SphericalCamera, ZOOM_FACTOR};
use crate::error::{Result, ViewerError};
use crate::input::DEFAULT_DRAG_DELAY;

/// Dataset files offered by the preset keys `1`-`4`, in key order.
pub const DEFAULT_PRESETS: [&str; 4] = ["LargeBuckyball.vol", "Frog.vol", "Foot.vol", "Skull.vol"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub volume: VolumeConfig,
    pub camera: CameraConfig,
    pub input: InputConfig,
    pub shader: ShaderConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "volview".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Which datasets are available and which one is shown first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Dataset opened at startup. When unset the first preset is used.
    pub initial: Option<PathBuf>,
    /// Directory the preset file names are resolved against.
    pub preset_dir: PathBuf,
    pub presets: Vec<String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            initial: None,
            preset_dir: PathBuf::from("data"),
            presets: DEFAULT_PRESETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub radius: f32,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub zoom_factor: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            fov_degrees: 70.0,
            zoom_factor: ZOOM_FACTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Milliseconds a button must be held before dragging rotates the camera.
    pub drag_delay_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            drag_delay_ms: DEFAULT_DRAG_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// WGSL file replacing the built-in ray-marching kernel.
    pub kernel: Option<PathBuf>,
}

impl ViewerConfig {
    /// Load config from a TOML file.
    ///
    /// Missing fields take their defaults. Out-of-range values are logged and
    /// replaced by their defaults rather than rejected.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ViewerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|source| ViewerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.sanitize();

        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    fn sanitize(&mut self) {
        let defaults = CameraConfig::default();
        let camera = &mut self.camera;
        if !(camera.radius > 0.0 && camera.radius.is_finite()) {
            log::warn!("camera.radius {} must be positive, using {}", camera.radius, defaults.radius);
            camera.radius = defaults.radius;
        }
        if !(camera.fov_degrees > 0.0 && camera.fov_degrees < 180.0) {
            log::warn!(
                "camera.fov_degrees {} must lie in (0, 180), using {}",
                camera.fov_degrees,
                defaults.fov_degrees
            );
            camera.fov_degrees = defaults.fov_degrees;
        }
        if !(camera.zoom_factor > 0.0 && camera.zoom_factor < 1.0) {
            log::warn!(
                "camera.zoom_factor {} must lie in (0, 1), using {}",
                camera.zoom_factor,
                defaults.zoom_factor
            );
            camera.zoom_factor = defaults.zoom_factor;
        }
        if self.window.width == 0 || self.window.height == 0 {
            let window = WindowConfig::default();
            log::warn!("window size must be non-zero, using {}x{}", window.width, window.height);
            self.window.width = window.width;
            self.window.height = window.height;
        }
    }

    /// Full path of the preset at `index`, if there is one.
    pub fn preset_path(&self, index: usize) -> Option<PathBuf> {
        self.volume
            .presets
            .get(index)
            .map(|name| self.volume.preset_dir.join(name))
    }

    /// Dataset to open at startup.
    pub fn initial_volume(&self) -> Option<PathBuf> {
        self.volume.initial.clone().or_else(|| self.preset_path(0))
    }

    /// The camera this configuration starts with.
    pub fn camera(&self) -> SphericalCamera {
        SphericalCamera::new()
            .radius(self.camera.radius)
            .fov(self.camera.fov_degrees)
            .zoom_factor(self.camera.zoom_factor)
    }

    pub fn drag_delay(&self) -> Duration {
        Duration::from_millis(self.input.drag_delay_ms)
    }
}
