//! # volview
//!
//! **An interactive viewer for scanned intensity volumes.**
//!
//! volview loads a 3-D grid of 8-bit samples from the `.vol` format, maps
//! intensities to colour and opacity through an editable transfer function,
//! and ray-marches the result on the GPU under an orbiting camera.
//!
//! ## Quick Start
//!
//! ```no_run
//! use volview::ViewerConfig;
//!
//! fn main() -> volview::Result<()> {
//!     let mut config = ViewerConfig::default();
//!     config.volume.initial = Some("data/Skull.vol".into());
//!     volview::run(config)
//! }
//! ```
//!
//! The CPU side is usable without a window:
//!
//! ```
//! use volview::{ControlPoints, VolumeDataset};
//!
//! let dataset = VolumeDataset::placeholder();
//! assert_eq!(dataset.samples, [0]);
//!
//! let lut = ControlPoints::default_palette().lut();
//! assert_eq!(lut.entries().len(), 256);
//! ```

mod app;
pub mod camera;
pub mod config;
mod error;
mod gpu;
pub mod input;
pub mod kernel;
pub mod orchestrator;
mod present_pass;
mod raymarch_pass;
pub mod resources;
pub mod shader;
pub mod state;
pub mod textures;
pub mod transfer_function;
pub mod transform;
pub mod volume;

pub use app::run;
pub use camera::{CameraBasis, SphericalCamera};
pub use config::ViewerConfig;
pub use error::{Result, ViewerError, VolumeError};
pub use gpu::GpuContext;
pub use kernel::{Axis, RaymarchUniforms, SliceRanges, dispatch_size};
pub use orchestrator::RenderOrchestrator;
pub use state::{Reconfigure, ViewerCommand, ViewerState};
pub use transfer_function::{ControlPoints, TransferFunctionLut, build_lut};
pub use transform::{PresetOrientation, VolumeTransform};
pub use volume::VolumeDataset;

// Re-export glam math types for convenience
pub use glam::{IVec3, Mat4, UVec2, Vec2, Vec3, Vec4};
