//! Loading of scanned intensity volumes from the `.vol` binary format.
//!
//! # File Layout
//!
//! A `.vol` file is a fixed 28-byte header followed by one unsigned byte per
//! voxel. Every header field is big-endian:
//!
//! | offset | field          | type |
//! |--------|----------------|------|
//! | 0      | resolution.z   | i32  |
//! | 4      | resolution.y   | i32  |
//! | 8      | resolution.x   | i32  |
//! | 12     | saved border   | i32  |
//! | 16     | true size.z    | f32  |
//! | 20     | true size.y    | f32  |
//! | 24     | true size.x    | f32  |
//! | 28..   | samples        | u8   |
//!
//! The x axis varies fastest in the sample payload, z slowest.
//!
//! # Example
//!
//! ```no_run
//! use volview::VolumeDataset;
//!
//! // Never fails: unreadable files yield a 1x1x1 placeholder.
//! let volume = VolumeDataset::load("Skull.vol");
//! println!("{volume}");
//! ```

use std::fmt;
use std::path::Path;

use glam::{IVec3, Vec3};

use crate::error::VolumeError;

/// Size of the fixed header preceding the sample payload.
pub const HEADER_LEN: usize = 28;

/// Name given to the dataset returned when loading fails.
pub const PLACEHOLDER_NAME: &str = "Placeholder";

/// A decoded intensity volume.
///
/// Datasets are immutable once built; loading a new file replaces the whole
/// value.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeDataset {
    /// File stem of the source path.
    pub name: String,
    /// Voxel counts per axis, x fastest-varying.
    pub resolution: IVec3,
    /// Border width recorded by the scanner. Informational only.
    pub saved_border: i32,
    /// Physical extent of the volume along each axis.
    pub true_size: Vec3,
    /// One 8-bit intensity per voxel.
    pub samples: Vec<u8>,
}

impl Default for VolumeDataset {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl VolumeDataset {
    /// The deterministic stand-in used whenever a file cannot be loaded.
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_NAME.to_string(),
            resolution: IVec3::ONE,
            saved_border: 0,
            true_size: Vec3::ONE,
            samples: vec![0],
        }
    }

    /// Load a dataset from disk.
    ///
    /// Missing or unreadable files, and files too short to hold a header, are
    /// logged and replaced by [`placeholder`](Self::placeholder).
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            log::error!(
                "volume file {} does not exist, loading placeholder",
                path.display()
            );
            return Self::placeholder();
        }

        let result = std::fs::read(path)
            .map_err(VolumeError::from)
            .and_then(|bytes| Self::decode(dataset_name(path), &bytes));

        match result {
            Ok(dataset) => {
                log::info!(
                    "loaded volume '{}' ({}x{}x{}) from {}",
                    dataset.name,
                    dataset.resolution.x,
                    dataset.resolution.y,
                    dataset.resolution.z,
                    path.display()
                );
                log::debug!("{dataset}");
                if !dataset.is_consistent() {
                    match dataset.expected_len() {
                        Some(expected) => log::warn!(
                            "volume '{}' holds {} samples but its resolution implies {expected}",
                            dataset.name,
                            dataset.samples.len()
                        ),
                        None => log::warn!(
                            "volume '{}' declares a resolution too large to address",
                            dataset.name
                        ),
                    }
                }
                dataset
            }
            Err(e) => {
                log::error!(
                    "loading volume {} failed ({e}), loading placeholder",
                    path.display()
                );
                Self::placeholder()
            }
        }
    }

    /// Decode a dataset from the raw bytes of a `.vol` file.
    ///
    /// The sample payload is taken verbatim; its length is not checked
    /// against the resolution.
    pub fn decode(name: impl Into<String>, bytes: &[u8]) -> Result<Self, VolumeError> {
        if bytes.len() < HEADER_LEN {
            return Err(VolumeError::TruncatedHeader {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let resolution = IVec3::new(
            read_i32(bytes, 8),
            read_i32(bytes, 4),
            read_i32(bytes, 0),
        );
        let saved_border = read_i32(bytes, 12);
        let true_size = Vec3::new(
            read_f32(bytes, 24),
            read_f32(bytes, 20),
            read_f32(bytes, 16),
        );

        Ok(Self {
            name: name.into(),
            resolution,
            saved_border,
            true_size,
            samples: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize the dataset back into the `.vol` layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.samples.len());
        for v in [
            self.resolution.z,
            self.resolution.y,
            self.resolution.x,
            self.saved_border,
        ] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        for v in [self.true_size.z, self.true_size.y, self.true_size.x] {
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        out.extend_from_slice(&self.samples);
        out
    }

    /// Number of samples implied by the resolution, `None` if the product
    /// overflows `usize`. Negative axes count as zero.
    pub fn expected_len(&self) -> Option<usize> {
        self.resolution
            .to_array()
            .iter()
            .map(|&n| usize::try_from(n).unwrap_or(0))
            .try_fold(1usize, usize::checked_mul)
    }

    /// Whether the payload length matches the resolution.
    pub fn is_consistent(&self) -> bool {
        self.expected_len() == Some(self.samples.len())
    }

    /// Smallest and largest sample value, or `None` for an empty payload.
    pub fn value_range(&self) -> Option<(u8, u8)> {
        let min = self.samples.iter().copied().min()?;
        let max = self.samples.iter().copied().max()?;
        Some((min, max))
    }
}

impl fmt::Display for VolumeDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----- {} Volume Data -----", self.name)?;
        writeln!(
            f,
            "Resolution: {}, {}, {}",
            self.resolution.x, self.resolution.y, self.resolution.z
        )?;
        writeln!(f, "Saved Border: {}", self.saved_border)?;
        writeln!(
            f,
            "True Size: {}, {}, {}",
            self.true_size.x, self.true_size.y, self.true_size.z
        )?;
        write!(f, "Values: {}", self.samples.len())?;
        if let Some((min, max)) = self.value_range() {
            write!(f, "\nRange of Values: min {min} max {max}")?;
        }
        Ok(())
    }
}

/// Dataset name for a path: directory and extension stripped.
pub fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether this host stores the least significant byte first.
///
/// Checked at runtime from the in-memory layout of a known word.
fn host_is_little_endian() -> bool {
    let marker: u16 = 1;
    marker.to_ne_bytes()[0] == 1
}

/// Compose the 4 bytes at `offset` most-significant first.
fn read_be_word(bytes: &[u8], offset: usize) -> u32 {
    let raw = [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ];
    let word = u32::from_ne_bytes(raw);
    if host_is_little_endian() {
        word.swap_bytes()
    } else {
        word
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    read_be_word(bytes, offset) as i32
}

// Bit reinterpretation, not a numeric cast.
fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_be_word(bytes, offset))
}
