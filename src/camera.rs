use std::f32::consts::PI;

use glam::Vec3;

/// Inclination is kept at least this far from either pole.
pub const THETA_EPSILON: f32 = 1e-5;

/// Radius multiplier applied per zoom-in tick; zoom-out divides by it.
pub const ZOOM_FACTOR: f32 = 0.95;

/// Most zoom steps a single wheel event can produce.
pub const MAX_SCROLL_STEPS: u32 = 10;

/// Orthonormal view basis handed to the ray-marching kernel.
///
/// `forward` points from the target towards the eye, so rays leave the eye
/// along `-forward`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraBasis {
    pub eye: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

/// A camera on a sphere around a fixed target.
///
/// # Example
/// ```
/// use volview::SphericalCamera;
///
/// let mut camera = SphericalCamera::new().radius(5.0);
/// camera.orbit(0.1, -0.2);
/// camera.zoom_in();
/// let basis = camera.basis();
/// assert!((basis.eye.length() - 5.0 * 0.95).abs() < 1e-4);
/// ```
#[derive(Clone, Debug)]
pub struct SphericalCamera {
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Reference up direction.
    pub up: Vec3,
    /// Distance from target.
    pub radius: f32,
    /// Inclination from the up axis in radians, kept inside `(ε, π − ε)`.
    pub theta: f32,
    /// Azimuth around the up axis in radians.
    pub phi: f32,
    /// Vertical field of view in radians.
    pub fov: f32,
    /// Radius multiplier per zoom-in tick, in `(0, 1)`.
    pub zoom_factor: f32,
}

impl Default for SphericalCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            up: Vec3::Y,
            radius: 5.0,
            theta: PI / 2.0,
            phi: 0.0,
            fov: 70f32.to_radians(),
            zoom_factor: ZOOM_FACTOR,
        }
    }
}

impl SphericalCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the distance from target. Non-positive values are ignored.
    pub fn radius(mut self, radius: f32) -> Self {
        if radius > 0.0 && radius.is_finite() {
            self.radius = radius;
        }
        self
    }

    /// Set the initial inclination in radians.
    pub fn theta(mut self, theta: f32) -> Self {
        self.theta = clamp_theta(theta);
        self
    }

    /// Set the initial azimuth in radians.
    pub fn phi(mut self, phi: f32) -> Self {
        self.phi = phi;
        self
    }

    /// Set the field of view in degrees.
    pub fn fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    /// Set the per-tick zoom multiplier. Values outside `(0, 1)` are ignored.
    pub fn zoom_factor(mut self, factor: f32) -> Self {
        if factor > 0.0 && factor < 1.0 {
            self.zoom_factor = factor;
        }
        self
    }

    /// Rotate around the target by the given angle increments.
    pub fn orbit(&mut self, delta_phi: f32, delta_theta: f32) {
        self.phi += delta_phi;
        self.theta = clamp_theta(self.theta + delta_theta);
    }

    pub fn zoom_in(&mut self) {
        self.radius *= self.zoom_factor;
    }

    pub fn zoom_out(&mut self) {
        self.radius /= self.zoom_factor;
    }

    /// Apply one wheel event of `lines`: one zoom step per started line,
    /// positive zooms in, negative zooms out.
    pub fn scroll(&mut self, lines: f32) {
        let steps = (lines.abs().ceil() as u32).min(MAX_SCROLL_STEPS);
        for _ in 0..steps {
            if lines < 0.0 {
                self.zoom_out();
            } else {
                self.zoom_in();
            }
        }
    }

    /// Eye position in world space.
    pub fn eye(&self) -> Vec3 {
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        // y is up, z points towards the viewer at phi = 0
        self.target + self.radius * Vec3::new(sin_phi * sin_theta, cos_theta, cos_phi * sin_theta)
    }

    /// Recompute the view basis from the spherical coordinates.
    pub fn basis(&self) -> CameraBasis {
        let eye = self.eye();
        let forward = (eye - self.target).normalize_or(Vec3::Z);

        // forward parallel to up leaves no cross product; use +Z as reference instead
        let right = self
            .up
            .cross(forward)
            .try_normalize()
            .unwrap_or_else(|| Vec3::Z.cross(forward).normalize_or(Vec3::X));
        let up = forward.cross(right).normalize();

        CameraBasis {
            eye,
            forward,
            right,
            up,
        }
    }

    /// Image plane extents at unit distance for the given aspect ratio.
    pub fn canvas(&self, aspect: f32) -> [f32; 2] {
        let height = 2.0 * (self.fov / 2.0).tan();
        [height * aspect, height]
    }
}

fn clamp_theta(theta: f32) -> f32 {
    theta.clamp(THETA_EPSILON, PI - THETA_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_orthonormal(b: &CameraBasis) {
        for v in [b.forward, b.right, b.up] {
            assert!((v.length() - 1.0).abs() < 1e-4, "{v} not unit");
        }
        assert!(b.forward.dot(b.right).abs() < 1e-4);
        assert!(b.forward.dot(b.up).abs() < 1e-4);
        assert!(b.right.dot(b.up).abs() < 1e-4);
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let basis = SphericalCamera::new().basis();
        assert!(basis.eye.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-4));
        assert!(basis.forward.abs_diff_eq(Vec3::Z, 1e-4));
        assert!(basis.right.abs_diff_eq(Vec3::X, 1e-4));
        assert!(basis.up.abs_diff_eq(Vec3::Y, 1e-4));
    }

    #[test]
    fn azimuth_quarter_turn_moves_eye_to_x() {
        let basis = SphericalCamera::new().phi(PI / 2.0).basis();
        assert!(basis.eye.abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-4));
        assert_orthonormal(&basis);
    }

    #[test]
    fn basis_near_pole_is_orthonormal() {
        let camera = SphericalCamera::new().theta(0.0);
        assert_eq!(camera.theta, THETA_EPSILON);
        assert_orthonormal(&camera.basis());
    }

    #[test]
    fn degenerate_up_falls_back() {
        let mut camera = SphericalCamera::new();
        camera.theta = 0.0; // bypass the clamp
        let basis = camera.basis();
        assert!(basis.right.is_finite());
        assert_orthonormal(&basis);
    }

    #[test]
    fn zoom_in_then_out_restores_radius() {
        let mut camera = SphericalCamera::new();
        camera.zoom_in();
        assert!((camera.radius - 4.75).abs() < 1e-6);
        camera.zoom_out();
        assert!((camera.radius - 5.0).abs() < 1e-5);
    }

    #[test]
    fn zero_scroll_is_ignored() {
        let mut camera = SphericalCamera::new();
        camera.scroll(0.0);
        assert_eq!(camera.radius, 5.0);
    }

    #[test]
    fn scroll_steps_once_per_line() {
        let mut stepped = SphericalCamera::new();
        for _ in 0..3 {
            stepped.zoom_in();
        }
        let mut scrolled = SphericalCamera::new();
        scrolled.scroll(3.0);
        assert_eq!(scrolled.radius, stepped.radius);

        let mut touchpad = SphericalCamera::new();
        touchpad.scroll(-0.25);
        assert!((touchpad.radius - 5.0 / ZOOM_FACTOR).abs() < 1e-5);
    }

    #[test]
    fn huge_scroll_is_capped() {
        let mut camera = SphericalCamera::new();
        camera.scroll(1e9);
        assert!(camera.radius > 0.0);
        let mut capped = SphericalCamera::new();
        capped.scroll(MAX_SCROLL_STEPS as f32);
        assert_eq!(camera.radius, capped.radius);
    }

    #[test]
    fn alternating_zoom_stays_positive() {
        let mut camera = SphericalCamera::new();
        for i in 0..10_000 {
            if i % 2 == 0 {
                camera.scroll(1.0);
            } else {
                camera.scroll(-1.0);
            }
        }
        assert!(camera.radius.is_finite());
        assert!(camera.radius > 0.0);
    }

    #[test]
    fn zoom_factor_builder_rejects_growth() {
        let camera = SphericalCamera::new().zoom_factor(1.5);
        assert_eq!(camera.zoom_factor, ZOOM_FACTOR);
        let mut camera = SphericalCamera::new().zoom_factor(0.5);
        camera.zoom_in();
        assert!((camera.radius - 2.5).abs() < 1e-6);
    }

    #[test]
    fn canvas_follows_fov() {
        let camera = SphericalCamera::new().fov(90.0);
        let [w, h] = camera.canvas(2.0);
        assert!((h - 2.0).abs() < 1e-5);
        assert!((w - 4.0).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn theta_never_leaves_open_interval(deltas in prop::collection::vec(-1e6f32..1e6, 1..64)) {
            let mut camera = SphericalCamera::new();
            for d in deltas {
                camera.orbit(d, d);
                prop_assert!(camera.theta >= THETA_EPSILON);
                prop_assert!(camera.theta <= PI - THETA_EPSILON);
            }
        }

        #[test]
        fn any_zoom_sequence_stays_positive(ticks in prop::collection::vec(any::<bool>(), 0..2_000)) {
            let mut camera = SphericalCamera::new();
            for zoom_in in ticks {
                if zoom_in { camera.zoom_in() } else { camera.zoom_out() }
            }
            prop_assert!(camera.radius.is_finite());
            prop_assert!(camera.radius > 0.0);
        }
    }
}
