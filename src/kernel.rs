//! Interface contract of the ray-marching compute kernel.
//!
//! The kernel itself is an opaque WGSL program; this module describes what
//! the orchestrator feeds it each frame and how large a grid it dispatches.
//!
//! # Bindings (group 0)
//!
//! | slot | resource |
//! |------|----------|
//! | 0 | [`RaymarchUniforms`] |
//! | 1 | volume samples, 3-D `R8Unorm` texture |
//! | 2 | volume sampler |
//! | 3 | transfer function, 256x1 `Rgba16Float` texture |
//! | 4 | transfer-function sampler |
//! | 5 | write-only `Rgba16Float` storage image |

use glam::{Mat4, UVec2, Vec2};

use crate::camera::CameraBasis;

pub const UNIFORM_BINDING: u32 = 0;
pub const VOLUME_TEXTURE_BINDING: u32 = 1;
pub const VOLUME_SAMPLER_BINDING: u32 = 2;
pub const TRANSFER_TEXTURE_BINDING: u32 = 3;
pub const TRANSFER_SAMPLER_BINDING: u32 = 4;
pub const OUTPUT_IMAGE_BINDING: u32 = 5;

/// Format of the image the kernel writes and the present pass samples.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Entry point the kernel must export.
pub const KERNEL_ENTRY_POINT: &str = "main";

/// Axis of the volume box, for slice ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Visible portion of the box along each axis, as `(min, max)` in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceRanges {
    pub x: Vec2,
    pub y: Vec2,
    pub z: Vec2,
}

impl Default for SliceRanges {
    fn default() -> Self {
        Self {
            x: Vec2::new(0.0, 1.0),
            y: Vec2::new(0.0, 1.0),
            z: Vec2::new(0.0, 1.0),
        }
    }
}

impl SliceRanges {
    /// Set one axis. Bounds are clamped to `[0, 1]` and ordered.
    pub fn set(&mut self, axis: Axis, min: f32, max: f32) {
        let (lo, hi) = (min.clamp(0.0, 1.0), max.clamp(0.0, 1.0));
        let range = Vec2::new(lo.min(hi), lo.max(hi));
        match axis {
            Axis::X => self.x = range,
            Axis::Y => self.y = range,
            Axis::Z => self.z = range,
        }
    }
}

/// Per-frame uniforms at binding 0.
///
/// # WGSL Declaration
///
/// ```wgsl
/// struct Uniforms {
///     eye: vec3f,
///     forward: vec3f,
///     right: vec3f,
///     up: vec3f,
///     canvas: vec2f,
///     x_slice: vec2f,
///     y_slice: vec2f,
///     z_slice: vec2f,
///     inverse_model: mat4x4f,
///     true_size: vec3f,
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RaymarchUniforms {
    pub eye: [f32; 3],
    pub _pad0: f32,
    pub forward: [f32; 3],
    pub _pad1: f32,
    pub right: [f32; 3],
    pub _pad2: f32,
    pub up: [f32; 3],
    pub _pad3: f32,
    /// Image plane extents at unit distance.
    pub canvas: [f32; 2],
    pub x_slice: [f32; 2],
    pub y_slice: [f32; 2],
    pub z_slice: [f32; 2],
    pub inverse_model: [[f32; 4]; 4],
    pub true_size: [f32; 3],
    pub _pad4: f32,
}

impl RaymarchUniforms {
    pub fn new(
        basis: &CameraBasis,
        canvas: [f32; 2],
        slices: &SliceRanges,
        inverse_model: Mat4,
        true_size: glam::Vec3,
    ) -> Self {
        Self {
            eye: basis.eye.to_array(),
            _pad0: 0.0,
            forward: basis.forward.to_array(),
            _pad1: 0.0,
            right: basis.right.to_array(),
            _pad2: 0.0,
            up: basis.up.to_array(),
            _pad3: 0.0,
            canvas,
            x_slice: slices.x.to_array(),
            y_slice: slices.y.to_array(),
            z_slice: slices.z.to_array(),
            inverse_model: inverse_model.to_cols_array_2d(),
            true_size: true_size.to_array(),
            _pad4: 0.0,
        }
    }
}

/// Work-group grid covering a `surface` with tiles of `local` invocations.
///
/// Partial tiles at the right and bottom edges get a whole group.
pub fn dispatch_size(surface: UVec2, local: UVec2) -> [u32; 3] {
    let local = local.max(UVec2::ONE);
    [
        surface.x.div_ceil(local.x),
        surface.y.div_ceil(local.y),
        1,
    ]
}

/// Read the `@workgroup_size(...)` a WGSL compute entry point declares.
///
/// Omitted y and z dimensions default to 1. Only literal sizes are understood.
pub fn declared_workgroup_size(source: &str) -> Option<[u32; 3]> {
    const ATTRIBUTE: &str = "@workgroup_size";

    let start = source.find(ATTRIBUTE)? + ATTRIBUTE.len();
    let rest = source[start..].trim_start().strip_prefix('(')?;
    let args = &rest[..rest.find(')')?];

    let mut size = [1u32; 3];
    let mut count = 0;
    for (slot, arg) in size.iter_mut().zip(args.split(',')) {
        let arg = arg.trim().trim_end_matches('u').trim_end_matches('i');
        if arg.is_empty() {
            continue;
        }
        *slot = arg.parse().ok()?;
        count += 1;
    }
    (count > 0).then_some(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dispatch_for_odd_surface() {
        assert_eq!(dispatch_size(UVec2::new(803, 451), UVec2::new(16, 16)), [51, 29, 1]);
    }

    #[test]
    fn dispatch_for_exact_multiple() {
        assert_eq!(dispatch_size(UVec2::new(800, 448), UVec2::new(16, 16)), [50, 28, 1]);
    }

    #[test]
    fn dispatch_for_empty_surface() {
        assert_eq!(dispatch_size(UVec2::ZERO, UVec2::new(8, 8)), [0, 0, 1]);
    }

    #[test]
    fn uniforms_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<RaymarchUniforms>(), 176);
        assert_eq!(std::mem::offset_of!(RaymarchUniforms, canvas), 64);
        assert_eq!(std::mem::offset_of!(RaymarchUniforms, inverse_model), 96);
        assert_eq!(std::mem::offset_of!(RaymarchUniforms, true_size), 160);
    }

    #[test]
    fn slice_bounds_are_clamped_and_ordered() {
        let mut slices = SliceRanges::default();
        slices.set(Axis::Y, 0.8, 0.2);
        slices.set(Axis::Z, -1.0, 2.0);
        assert_eq!(slices.y, Vec2::new(0.2, 0.8));
        assert_eq!(slices.z, Vec2::new(0.0, 1.0));
        assert_eq!(slices.x, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn parses_workgroup_attribute() {
        let src = "@compute @workgroup_size(16, 8, 1)\nfn main() {}";
        assert_eq!(declared_workgroup_size(src), Some([16, 8, 1]));
        assert_eq!(declared_workgroup_size("@workgroup_size(32)"), Some([32, 1, 1]));
        assert_eq!(declared_workgroup_size("@workgroup_size( 8u, 4u )"), Some([8, 4, 1]));
        assert_eq!(declared_workgroup_size("@workgroup_size(WG_X, 8)"), None);
        assert_eq!(declared_workgroup_size("fn main() {}"), None);
    }

    #[test]
    fn shipped_kernel_declares_its_size() {
        let size = declared_workgroup_size(include_str!("shaders/raymarch.wgsl"));
        assert_eq!(size, Some([16, 16, 1]));
    }

    proptest! {
        #[test]
        fn dispatch_covers_minimally(w in 1u32..8192, h in 1u32..8192, lx in 1u32..64, ly in 1u32..64) {
            let [gx, gy, gz] = dispatch_size(UVec2::new(w, h), UVec2::new(lx, ly));
            prop_assert_eq!(gz, 1);
            prop_assert!(gx * lx >= w);
            prop_assert!(gy * ly >= h);
            prop_assert!((gx - 1) * lx < w);
            prop_assert!((gy - 1) * ly < h);
        }
    }
}
