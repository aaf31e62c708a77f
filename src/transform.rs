//! Model transform of the volume box.
//!
//! The kernel samples the volume in a unit cube centred on the origin. The
//! model matrix stretches that cube to the dataset's physical proportions,
//! applies any corrective orientation for known scans, then the user's Euler
//! rotation. The kernel receives the inverse, taking world-space rays back
//! into sampling space.

use glam::{Mat4, Vec3};

/// Fixed orientation corrections for known preset scans, so the scan's head
/// or top ends up along display "up".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresetOrientation {
    #[default]
    None,
    /// Scans stored lying on their back (`Foot`, `Skull`).
    Supine,
    /// The `Frog` scan, stored on its side.
    Lateral,
}

impl PresetOrientation {
    /// The correction registered for a dataset name.
    pub fn for_dataset(name: &str) -> Self {
        match name {
            "Foot" | "Skull" => Self::Supine,
            "Frog" => Self::Lateral,
            _ => Self::None,
        }
    }

    pub fn matrix(self) -> Mat4 {
        match self {
            Self::None => Mat4::IDENTITY,
            Self::Supine => Mat4::from_rotation_x((-90f32).to_radians()),
            Self::Lateral => {
                Mat4::from_rotation_y((-90f32).to_radians())
                    * Mat4::from_rotation_x(90f32.to_radians())
            }
        }
    }
}

/// Orientation and size of the volume box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeTransform {
    /// User rotation about x, y and z in degrees.
    pub rotation_degrees: Vec3,
    /// Physical extent of the box, from the dataset.
    pub true_size: Vec3,
    pub preset: PresetOrientation,
}

impl Default for VolumeTransform {
    fn default() -> Self {
        Self {
            rotation_degrees: Vec3::ZERO,
            true_size: Vec3::ONE,
            preset: PresetOrientation::None,
        }
    }
}

impl VolumeTransform {
    pub fn new(true_size: Vec3, preset: PresetOrientation) -> Self {
        Self {
            true_size,
            preset,
            ..Self::default()
        }
    }

    /// Local box to world: scale, preset correction, then X, Y and Z rotation.
    pub fn model(&self) -> Mat4 {
        let r = self.rotation_degrees;
        Mat4::from_rotation_z(r.z.to_radians())
            * Mat4::from_rotation_y(r.y.to_radians())
            * Mat4::from_rotation_x(r.x.to_radians())
            * self.preset.matrix()
            * Mat4::from_scale(self.true_size)
    }

    /// World to local sampling space.
    pub fn inverse_model(&self) -> Mat4 {
        self.model().inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rotation_only_unscales() {
        let transform = VolumeTransform::new(Vec3::new(2.0, 4.0, 8.0), PresetOrientation::None);
        let local = transform
            .inverse_model()
            .transform_point3(Vec3::new(1.0, 2.0, 4.0));
        assert!(local.abs_diff_eq(Vec3::splat(0.5), 1e-5));
    }

    #[test]
    fn scaled_corners_map_back_to_unit_cube() {
        let mut transform = VolumeTransform::new(Vec3::new(1.0, 0.5, 2.0), PresetOrientation::None);
        transform.rotation_degrees = Vec3::new(30.0, -45.0, 120.0);
        let model = transform.model();
        let inverse = transform.inverse_model();
        for corner in [Vec3::splat(0.5), Vec3::new(-0.5, 0.5, -0.5)] {
            let world = model.transform_point3(corner);
            assert!(inverse.transform_point3(world).abs_diff_eq(corner, 1e-4));
        }
    }

    #[test]
    fn scale_is_applied_before_rotation() {
        // A long x axis rotated 90 degrees about z ends up long in y.
        let mut transform = VolumeTransform::new(Vec3::new(4.0, 1.0, 1.0), PresetOrientation::None);
        transform.rotation_degrees = Vec3::new(0.0, 0.0, 90.0);
        let tip = transform.model().transform_point3(Vec3::new(0.5, 0.0, 0.0));
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn preset_names() {
        assert_eq!(PresetOrientation::for_dataset("Skull"), PresetOrientation::Supine);
        assert_eq!(PresetOrientation::for_dataset("Foot"), PresetOrientation::Supine);
        assert_eq!(PresetOrientation::for_dataset("Frog"), PresetOrientation::Lateral);
        assert_eq!(PresetOrientation::for_dataset("LargeBuckyball"), PresetOrientation::None);
        assert_eq!(PresetOrientation::for_dataset("skull"), PresetOrientation::None);
    }

    #[test]
    fn supine_preset_turns_z_into_up() {
        let transform = VolumeTransform::new(Vec3::ONE, PresetOrientation::Supine);
        let top = transform.model().transform_point3(Vec3::new(0.0, 0.0, 0.5));
        assert!(top.abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1e-5));
    }

    #[test]
    fn preset_survives_user_rotation() {
        let mut with_preset = VolumeTransform::new(Vec3::ONE, PresetOrientation::Supine);
        let plain = VolumeTransform::new(Vec3::ONE, PresetOrientation::None);
        with_preset.rotation_degrees = Vec3::new(0.0, 10.0, 0.0);
        assert_ne!(with_preset.model(), plain.model());
        assert!(
            (with_preset.model() * Mat4::from_rotation_x(90f32.to_radians()))
                .abs_diff_eq(Mat4::from_rotation_y(10f32.to_radians()), 1e-5)
        );
    }
}
