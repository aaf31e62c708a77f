//! Viewer state mutated by commands between frames.
//!
//! Input handlers never touch GPU resources directly. They queue a
//! [`ViewerCommand`]; at the start of the next frame the orchestrator applies
//! every pending command to the [`ViewerState`] and rebuilds only what the
//! returned [`Reconfigure`] flags name.

use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;

use glam::{UVec2, Vec3};

use crate::kernel::{Axis, SliceRanges};
use crate::transfer_function::ControlPoints;
use crate::transform::{PresetOrientation, VolumeTransform};
use crate::volume::VolumeDataset;

/// A requested change to the viewer.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerCommand {
    /// Load a `.vol` file, replacing the current dataset.
    LoadDataset(PathBuf),
    /// Load the preset at this index of the configured list.
    SelectPreset(usize),
    /// Set the user rotation about x, y and z, in degrees.
    SetRotation(Vec3),
    SetColorPoint(i32, Vec3),
    SetOpacityPoint(i32, f32),
    /// Restrict the visible box along one axis to `[min, max]`.
    SetSlice(Axis, f32, f32),
    /// New surface size in pixels.
    Resize(u32, u32),
}

/// Derived artefacts a command invalidated.
///
/// Camera and slice changes are not listed: they travel in the per-frame
/// uniforms, which are always rewritten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconfigure {
    pub render_target: bool,
    pub volume_image: bool,
    pub transfer_function: bool,
    pub transform: bool,
}

impl Reconfigure {
    pub const NONE: Self = Self {
        render_target: false,
        volume_image: false,
        transfer_function: false,
        transform: false,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Whether a GPU image is replaced, so bind groups must be rebuilt.
    pub fn images_changed(&self) -> bool {
        self.render_target || self.volume_image || self.transfer_function
    }
}

impl BitOr for Reconfigure {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            render_target: self.render_target || rhs.render_target,
            volume_image: self.volume_image || rhs.volume_image,
            transfer_function: self.transfer_function || rhs.transfer_function,
            transform: self.transform || rhs.transform,
        }
    }
}

impl BitOrAssign for Reconfigure {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// Everything the frame is rendered from, apart from the camera.
#[derive(Clone, Debug)]
pub struct ViewerState {
    pub dataset: VolumeDataset,
    pub control_points: ControlPoints,
    pub transform: VolumeTransform,
    pub slices: SliceRanges,
    pub surface: UVec2,
    presets: Vec<PathBuf>,
}

impl ViewerState {
    /// State showing the placeholder dataset with the default palette.
    pub fn new(surface: UVec2, presets: Vec<PathBuf>) -> Self {
        let dataset = VolumeDataset::placeholder();
        let transform = transform_for(&dataset);
        Self {
            dataset,
            control_points: ControlPoints::default_palette(),
            transform,
            slices: SliceRanges::default(),
            surface: surface.max(UVec2::ONE),
            presets,
        }
    }

    pub fn presets(&self) -> &[PathBuf] {
        &self.presets
    }

    /// Current user rotation in degrees.
    pub fn rotation(&self) -> Vec3 {
        self.transform.rotation_degrees
    }

    /// Apply one command and report what must be rebuilt.
    pub fn apply(&mut self, command: ViewerCommand) -> Reconfigure {
        match command {
            ViewerCommand::LoadDataset(path) => {
                self.replace_dataset(VolumeDataset::load(path))
            }
            ViewerCommand::SelectPreset(index) => match self.presets.get(index).cloned() {
                Some(path) => self.replace_dataset(VolumeDataset::load(path)),
                None => {
                    log::warn!("no preset at index {index}");
                    Reconfigure::NONE
                }
            },
            ViewerCommand::SetRotation(degrees) => {
                if self.transform.rotation_degrees == degrees {
                    return Reconfigure::NONE;
                }
                self.transform.rotation_degrees = degrees;
                Reconfigure {
                    transform: true,
                    ..Reconfigure::NONE
                }
            }
            ViewerCommand::SetColorPoint(key, color) => {
                self.control_points.set_color(key, color);
                Reconfigure {
                    transfer_function: true,
                    ..Reconfigure::NONE
                }
            }
            ViewerCommand::SetOpacityPoint(key, opacity) => {
                self.control_points.set_opacity(key, opacity);
                Reconfigure {
                    transfer_function: true,
                    ..Reconfigure::NONE
                }
            }
            ViewerCommand::SetSlice(axis, min, max) => {
                self.slices.set(axis, min, max);
                Reconfigure::NONE
            }
            ViewerCommand::Resize(width, height) => {
                let surface = UVec2::new(width, height);
                // minimised windows report zero; keep the last real size
                if width == 0 || height == 0 || surface == self.surface {
                    return Reconfigure::NONE;
                }
                self.surface = surface;
                Reconfigure {
                    render_target: true,
                    ..Reconfigure::NONE
                }
            }
        }
    }

    fn replace_dataset(&mut self, dataset: VolumeDataset) -> Reconfigure {
        let rotation = self.transform.rotation_degrees;
        self.transform = VolumeTransform {
            rotation_degrees: rotation,
            ..transform_for(&dataset)
        };
        self.dataset = dataset;
        Reconfigure {
            volume_image: true,
            transform: true,
            ..Reconfigure::NONE
        }
    }
}

fn transform_for(dataset: &VolumeDataset) -> VolumeTransform {
    VolumeTransform::new(dataset.true_size, PresetOrientation::for_dataset(&dataset.name))
}
