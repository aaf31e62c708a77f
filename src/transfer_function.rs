//! Transfer functions mapping 8-bit intensity to colour and opacity.
//!
//! Users edit two sparse maps of control points, one for colour and one for
//! opacity. [`build_lut`] expands them into a dense [`TransferFunctionLut`]
//! of 256 RGBA entries by linear interpolation between neighbouring keys.

use std::collections::BTreeMap;

use glam::{Vec3, Vec4};

/// Number of entries in a transfer-function table.
pub const LUT_SIZE: usize = 256;

/// Highest valid intensity key.
pub const MAX_KEY: i32 = LUT_SIZE as i32 - 1;

/// Spacing of colour keys on the editing grid.
pub const COLOR_KEY_STRIDE: usize = 15;

/// Spacing of opacity keys on the editing grid.
pub const OPACITY_KEY_STRIDE: usize = 5;

/// Sparse colour and opacity control points keyed by intensity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlPoints {
    pub color: BTreeMap<i32, Vec3>,
    pub opacity: BTreeMap<i32, f32>,
}

impl ControlPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// The startup palette: a blue to red ramp with two opacity peaks at
    /// intensities 80 and 130, resampled onto the editing grid.
    pub fn default_palette() -> Self {
        let seed = Self {
            color: BTreeMap::from([
                (0, Vec3::new(0.0, 0.0, 0.51)),
                (51, Vec3::new(0.0, 0.24, 0.67)),
                (102, Vec3::new(0.02, 1.0, 1.0)),
                (153, Vec3::new(1.0, 1.0, 0.0)),
                (204, Vec3::new(0.98, 0.0, 0.0)),
                (255, Vec3::new(0.50, 0.0, 0.0)),
            ]),
            opacity: BTreeMap::from([
                (75, 0.0),
                (80, 0.2),
                (85, 0.0),
                (125, 0.0),
                (130, 0.8),
                (135, 0.0),
            ]),
        };
        seed.resampled(COLOR_KEY_STRIDE, OPACITY_KEY_STRIDE)
    }

    /// Re-key these control points onto a regular grid, sampling values
    /// from the interpolated table.
    pub fn resampled(&self, color_stride: usize, opacity_stride: usize) -> Self {
        let lut = build_lut(&self.color, &self.opacity);
        let color = (0..LUT_SIZE)
            .step_by(color_stride.max(1))
            .map(|i| (i as i32, lut[i].truncate()))
            .collect();
        let opacity = (0..LUT_SIZE)
            .step_by(opacity_stride.max(1))
            .map(|i| (i as i32, lut[i].w))
            .collect();
        Self { color, opacity }
    }

    /// Set the colour at one key.
    pub fn set_color(&mut self, key: i32, color: Vec3) {
        self.color.insert(key, color);
    }

    /// Set the opacity at one key, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, key: i32, opacity: f32) {
        self.opacity.insert(key, opacity.clamp(0.0, 1.0));
    }

    /// Build the dense table for the current control points.
    pub fn lut(&self) -> TransferFunctionLut {
        build_lut(&self.color, &self.opacity)
    }
}

/// Dense 256-entry RGBA table indexed by intensity.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferFunctionLut {
    entries: [Vec4; LUT_SIZE],
}

impl TransferFunctionLut {
    pub fn entries(&self) -> &[Vec4; LUT_SIZE] {
        &self.entries
    }

    /// Pack the table as half floats, four per entry, for an `Rgba16Float` texture.
    pub fn to_rgba16f(&self) -> Vec<u16> {
        self.entries
            .iter()
            .flat_map(|e| e.to_array())
            .map(|c| half::f16::from_f32(c).to_bits())
            .collect()
    }
}

impl std::ops::Index<usize> for TransferFunctionLut {
    type Output = Vec4;

    fn index(&self, index: usize) -> &Vec4 {
        &self.entries[index]
    }
}

/// Expand sparse colour and opacity control points into a dense table.
///
/// Missing endpoints at 0 and 255 default to black and fully transparent.
/// Entries at supplied keys equal the supplied values exactly; entries in
/// between lie on the segment joining their neighbouring keys. Keys outside
/// `[0, 255]` are ignored.
pub fn build_lut(color: &BTreeMap<i32, Vec3>, opacity: &BTreeMap<i32, f32>) -> TransferFunctionLut {
    let rgb = interpolate_channel(color, Vec3::ZERO);
    let alpha = interpolate_channel(opacity, 0.0f32);

    let mut entries = [Vec4::ZERO; LUT_SIZE];
    for (entry, (c, a)) in entries.iter_mut().zip(rgb.iter().zip(alpha.iter())) {
        *entry = c.extend(*a);
    }
    TransferFunctionLut { entries }
}

/// Values that can be linearly interpolated between control points.
trait Lerp: Copy {
    fn lerp_to(self, end: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp_to(self, end: Self, t: f32) -> Self {
        self + (end - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp_to(self, end: Self, t: f32) -> Self {
        self + (end - self) * t
    }
}

fn interpolate_channel<T: Lerp>(points: &BTreeMap<i32, T>, default: T) -> [T; LUT_SIZE] {
    let mut out = [default; LUT_SIZE];

    let start = points.get(&0).copied().unwrap_or(default);
    let end = points.get(&MAX_KEY).copied().unwrap_or(default);

    let interior = points
        .range(1..MAX_KEY)
        .map(|(&key, &value)| (key, value));
    let keys = std::iter::once((0, start))
        .chain(interior)
        .chain(std::iter::once((MAX_KEY, end)));

    let (mut tstart, mut vstart) = (0i32, start);
    for (tend, vend) in keys {
        let tdiff = tend - tstart;
        for i in 1..tdiff {
            let t = i as f32 / tdiff as f32;
            out[(tstart + i) as usize] = vstart.lerp_to(vend, t);
        }
        out[tend as usize] = vend;
        tstart = tend;
        vstart = vend;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-5
    }

    #[test]
    fn empty_maps_give_transparent_black() {
        let lut = build_lut(&BTreeMap::new(), &BTreeMap::new());
        assert_eq!(lut.entries().len(), LUT_SIZE);
        assert!(lut.entries().iter().all(|e| *e == Vec4::ZERO));
    }

    #[test]
    fn missing_endpoints_default_to_black_and_zero() {
        let color = BTreeMap::from([(128, Vec3::ONE)]);
        let opacity = BTreeMap::from([(128, 1.0)]);
        let lut = build_lut(&color, &opacity);

        assert_eq!(lut[0], Vec4::ZERO);
        assert_eq!(lut[255], Vec4::ZERO);
        assert_eq!(lut[128], Vec4::ONE);
        assert!(approx(lut[64].x, 0.5));
        assert!(approx(lut[64].w, 0.5));
    }

    #[test]
    fn out_of_range_keys_are_ignored() {
        let color = BTreeMap::from([(-5, Vec3::ONE), (300, Vec3::ONE), (255, Vec3::X)]);
        let opacity = BTreeMap::from([(-1, 1.0), (256, 1.0)]);
        let lut = build_lut(&color, &opacity);

        assert_eq!(lut[0], Vec4::ZERO);
        assert_eq!(lut[255], Vec4::new(1.0, 0.0, 0.0, 0.0));
        assert!(lut.entries().iter().all(|e| e.w == 0.0));
    }

    #[test]
    fn adjacent_keys_need_no_interpolation() {
        let opacity = BTreeMap::from([(10, 0.3), (11, 0.7)]);
        let lut = build_lut(&BTreeMap::new(), &opacity);
        assert_eq!(lut[10].w, 0.3);
        assert_eq!(lut[11].w, 0.7);
    }

    #[test]
    fn default_palette_lives_on_the_editing_grid() {
        let points = ControlPoints::default_palette();
        assert_eq!(points.color.len(), 18);
        assert_eq!(points.opacity.len(), 52);
        assert!(points.color.keys().all(|k| *k as usize % COLOR_KEY_STRIDE == 0));
        assert!(points.opacity.keys().all(|k| *k as usize % OPACITY_KEY_STRIDE == 0));
        assert_eq!(points.opacity[&80], 0.2);
        assert_eq!(points.opacity[&130], 0.8);
        assert_eq!(points.color[&0], Vec3::new(0.0, 0.0, 0.51));
    }

    #[test]
    fn set_opacity_clamps() {
        let mut points = ControlPoints::new();
        points.set_opacity(40, 1.5);
        points.set_opacity(41, -0.2);
        assert_eq!(points.opacity[&40], 1.0);
        assert_eq!(points.opacity[&41], 0.0);
    }

    #[test]
    fn half_float_packing() {
        let lut = build_lut(&BTreeMap::from([(255, Vec3::ONE)]), &BTreeMap::from([(255, 1.0)]));
        let packed = lut.to_rgba16f();
        assert_eq!(packed.len(), LUT_SIZE * 4);
        let one = half::f16::from_f32(1.0).to_bits();
        assert_eq!(&packed[255 * 4..], &[one, one, one, one]);
        assert_eq!(&packed[..4], &[0, 0, 0, 0]);
    }

    fn sparse_opacity() -> impl Strategy<Value = BTreeMap<i32, f32>> {
        prop::collection::btree_map(0i32..=255, 0.0f32..=1.0, 0..20)
    }

    fn sparse_color() -> impl Strategy<Value = BTreeMap<i32, Vec3>> {
        prop::collection::btree_map(
            0i32..=255,
            (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(r, g, b)| Vec3::new(r, g, b)),
            0..20,
        )
    }

    proptest! {
        #[test]
        fn supplied_keys_are_exact(color in sparse_color(), opacity in sparse_opacity()) {
            let lut = build_lut(&color, &opacity);
            for (&k, &c) in &color {
                prop_assert_eq!(lut[k as usize].truncate(), c);
            }
            for (&k, &a) in &opacity {
                prop_assert_eq!(lut[k as usize].w, a);
            }
        }

        #[test]
        fn intermediate_entries_are_linear(opacity in sparse_opacity()) {
            let lut = build_lut(&BTreeMap::new(), &opacity);

            let mut keys = opacity.clone();
            keys.entry(0).or_insert(0.0);
            keys.entry(255).or_insert(0.0);
            let keys: Vec<_> = keys.into_iter().collect();

            for pair in keys.windows(2) {
                let (a, va) = pair[0];
                let (b, vb) = pair[1];
                for i in (a + 1)..b {
                    let expected = va + (vb - va) * ((i - a) as f32 / (b - a) as f32);
                    prop_assert!(approx(lut[i as usize].w, expected));
                }
            }
        }
    }
}
