//! GPU images used by the ray-marching pipeline.
//!
//! Each type owns one texture plus the view the bind groups reference, and is
//! held in a [`ResourceSlot`](crate::resources::ResourceSlot) by the
//! orchestrator.

use std::borrow::Cow;

use glam::UVec3;

use crate::gpu::GpuContext;
use crate::kernel::OUTPUT_FORMAT;
use crate::resources::GpuResource;
use crate::transfer_function::{LUT_SIZE, TransferFunctionLut};
use crate::volume::VolumeDataset;

/// Storage image the kernel writes and the present pass samples.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Create a target matching the current surface size.
    pub fn new(gpu: &GpuContext) -> Self {
        let (width, height) = (gpu.width(), gpu.height());
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("raymarch output"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl GpuResource for RenderTarget {
    fn release(self) {
        self.texture.destroy();
    }
}

/// The dataset's samples as a 3-D `R8Unorm` texture, x varying fastest.
pub struct VolumeImage {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    extent: UVec3,
}

impl VolumeImage {
    /// Upload `dataset`, or the placeholder when it exceeds the device's 3-D
    /// texture limits.
    pub fn new(gpu: &GpuContext, dataset: &VolumeDataset) -> Self {
        let max_dimension = gpu.device.limits().max_texture_dimension_3d;
        let placeholder;
        let (dataset, extent, texel_count) = match upload_extent(dataset, max_dimension) {
            Some((extent, texel_count)) => (dataset, extent, texel_count),
            None => {
                log::error!(
                    "volume '{}' ({}x{}x{}) exceeds the device limit of {max_dimension} texels per axis, uploading placeholder",
                    dataset.name,
                    dataset.resolution.x,
                    dataset.resolution.y,
                    dataset.resolution.z
                );
                placeholder = VolumeDataset::placeholder();
                (&placeholder, UVec3::ONE, 1)
            }
        };

        let size = wgpu::Extent3d {
            width: extent.x,
            height: extent.y,
            depth_or_array_layers: extent.z,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("volume {}", dataset.name)),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let payload = fit_payload(&dataset.samples, texel_count);
        if payload.len() != dataset.samples.len() {
            log::warn!(
                "volume '{}' holds {} samples for a {}x{}x{} grid; uploading {} bytes",
                dataset.name,
                dataset.samples.len(),
                extent.x,
                extent.y,
                extent.z,
                texel_count
            );
        }

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &payload,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(extent.x),
                rows_per_image: Some(extent.y),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            extent,
        }
    }

    pub fn extent(&self) -> UVec3 {
        self.extent
    }
}

impl GpuResource for VolumeImage {
    fn release(self) {
        self.texture.destroy();
    }
}

/// The lookup table as a 256x1 `Rgba16Float` texture.
pub struct TransferFunctionImage {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl TransferFunctionImage {
    pub fn new(gpu: &GpuContext, lut: &TransferFunctionLut) -> Self {
        let size = wgpu::Extent3d {
            width: LUT_SIZE as u32,
            height: 1,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("transfer function"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texels = lut.to_rgba16f();
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // four half floats per texel
                bytes_per_row: Some(LUT_SIZE as u32 * 8),
                rows_per_image: None,
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

impl GpuResource for TransferFunctionImage {
    fn release(self) {
        self.texture.destroy();
    }
}

/// Texture extent for a dataset. Non-positive resolutions become 1.
pub fn volume_extent(dataset: &VolumeDataset) -> UVec3 {
    dataset.resolution.max(glam::IVec3::ONE).as_uvec3()
}

/// Extent and texel count to upload for a dataset.
///
/// `None` when an axis exceeds `max_dimension` or the texel count does not
/// fit in `usize`.
pub fn upload_extent(dataset: &VolumeDataset, max_dimension: u32) -> Option<(UVec3, usize)> {
    let extent = volume_extent(dataset);
    if extent.max_element() > max_dimension {
        return None;
    }
    let texel_count = extent
        .to_array()
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(usize::try_from(n).ok()?))?;
    Some((extent, texel_count))
}

/// Pad with zeros or truncate `samples` to exactly `len` bytes.
pub fn fit_payload(samples: &[u8], len: usize) -> Cow<'_, [u8]> {
    if samples.len() == len {
        Cow::Borrowed(samples)
    } else if samples.len() > len {
        Cow::Borrowed(&samples[..len])
    } else {
        let mut padded = samples.to_vec();
        padded.resize(len, 0);
        Cow::Owned(padded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec3, Vec3};

    fn dataset(resolution: IVec3, samples: Vec<u8>) -> VolumeDataset {
        VolumeDataset {
            name: "test".into(),
            resolution,
            saved_border: 0,
            true_size: Vec3::ONE,
            samples,
        }
    }

    #[test]
    fn exact_payload_is_borrowed() {
        let samples = [1u8, 2, 3, 4];
        assert!(matches!(fit_payload(&samples, 4), Cow::Borrowed(s) if s == samples));
    }

    #[test]
    fn short_payload_is_zero_padded() {
        assert_eq!(&*fit_payload(&[7, 8], 5), &[7, 8, 0, 0, 0]);
    }

    #[test]
    fn long_payload_is_truncated() {
        assert_eq!(&*fit_payload(&[1, 2, 3, 4, 5], 3), &[1, 2, 3]);
    }

    #[test]
    fn extent_clamps_degenerate_resolution() {
        let extent = volume_extent(&dataset(IVec3::new(4, 0, -3), vec![]));
        assert_eq!(extent, UVec3::new(4, 1, 1));
    }

    #[test]
    fn upload_extent_counts_texels() {
        let volume = dataset(IVec3::new(4, 3, 2), vec![0; 24]);
        assert_eq!(upload_extent(&volume, 2048), Some((UVec3::new(4, 3, 2), 24)));
    }

    #[test]
    fn oversized_axis_is_rejected() {
        let volume = dataset(IVec3::new(4096, 1, 1), vec![0; 4096]);
        assert_eq!(upload_extent(&volume, 2048), None);
        assert!(upload_extent(&volume, 4096).is_some());
    }

    #[test]
    fn overflowing_resolution_is_rejected() {
        let volume = dataset(IVec3::splat(i32::MAX), vec![7]);
        assert_eq!(upload_extent(&volume, u32::MAX), None);
        assert_eq!(upload_extent(&volume, 2048), None);
    }

    #[test]
    fn extent_of_placeholder_is_one_voxel() {
        assert_eq!(volume_extent(&VolumeDataset::placeholder()), UVec3::ONE);
    }
}
