//! Compute pass running the ray-marching kernel.
//!
//! The pass owns the compute pipeline, its uniform buffer and samplers. The
//! bind group references the current volume, transfer-function and output
//! images, so it is rebuilt with [`RaymarchPass::bind`] whenever any of them
//! is replaced.

use glam::UVec2;

use crate::error::Result;
use crate::gpu::GpuContext;
use crate::kernel::{
    self, KERNEL_ENTRY_POINT, OUTPUT_FORMAT, OUTPUT_IMAGE_BINDING, RaymarchUniforms,
    TRANSFER_SAMPLER_BINDING, TRANSFER_TEXTURE_BINDING, UNIFORM_BINDING, VOLUME_SAMPLER_BINDING,
    VOLUME_TEXTURE_BINDING,
};
use crate::resources::GpuResource;
use crate::shader::{CompiledShader, ShaderService};
use crate::textures::{RenderTarget, TransferFunctionImage, VolumeImage};

/// Local size assumed when a kernel's work-group size cannot be read.
pub const FALLBACK_LOCAL_SIZE: [u32; 3] = [16, 16, 1];

pub struct RaymarchPass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    volume_sampler: wgpu::Sampler,
    transfer_sampler: wgpu::Sampler,
    bind_group: Option<wgpu::BindGroup>,
    local_size: UVec2,
}

impl RaymarchPass {
    /// Build the compute pipeline around a compiled kernel.
    ///
    /// # Errors
    ///
    /// Fails when the kernel has no `main` entry point or its bindings do
    /// not match the six-entry layout.
    pub fn new(device: &wgpu::Device, kernel: &CompiledShader) -> Result<Self> {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Raymarch Uniforms"),
            size: std::mem::size_of::<RaymarchUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Raymarch Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: UNIFORM_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: VOLUME_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: VOLUME_SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: TRANSFER_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: TRANSFER_SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: OUTPUT_IMAGE_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: OUTPUT_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Raymarch Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = ShaderService::new(device).link(kernel, |device| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Raymarch Pipeline"),
                layout: Some(&pipeline_layout),
                module: &kernel.module,
                entry_point: Some(KERNEL_ENTRY_POINT),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;

        // Samples are clamped to the box edge, the kernel handles clipping
        let volume_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let transfer_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Transfer Function Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let [lx, ly, _] = kernel.workgroup_size.unwrap_or_else(|| {
            log::warn!(
                "kernel declares no literal @workgroup_size, assuming {:?}",
                FALLBACK_LOCAL_SIZE
            );
            FALLBACK_LOCAL_SIZE
        });
        log::info!("ray-march kernel local size {lx}x{ly}");

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            volume_sampler,
            transfer_sampler,
            bind_group: None,
            local_size: UVec2::new(lx, ly),
        })
    }

    /// Point the kernel at a new set of images.
    pub fn bind(
        &mut self,
        gpu: &GpuContext,
        volume: &VolumeImage,
        transfer: &TransferFunctionImage,
        target: &RenderTarget,
    ) {
        self.bind_group = Some(gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raymarch Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: VOLUME_TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&volume.view),
                },
                wgpu::BindGroupEntry {
                    binding: VOLUME_SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.volume_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: TRANSFER_TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&transfer.view),
                },
                wgpu::BindGroupEntry {
                    binding: TRANSFER_SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.transfer_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: OUTPUT_IMAGE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&target.view),
                },
            ],
        }));
    }

    pub fn write_uniforms(&self, gpu: &GpuContext, uniforms: &RaymarchUniforms) {
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }

    /// Record the kernel dispatch covering `surface`.
    ///
    /// Returns the work-group grid, or `None` when nothing is bound yet.
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, surface: UVec2) -> Option<[u32; 3]> {
        let bind_group = self.bind_group.as_ref()?;
        let groups = kernel::dispatch_size(surface, self.local_size);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Raymarch Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);

        Some(groups)
    }
}

impl GpuResource for RaymarchPass {
    fn release(self) {
        self.uniform_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::shader::{RAYMARCH_KERNEL, ShaderStage};

    #[test]
    fn embedded_kernel_links() {
        let Some(device) = crate::gpu::headless_device() else {
            eprintln!("skipping: no GPU adapter available");
            return;
        };
        let kernel = ShaderService::new(&device)
            .compile(ShaderStage::Compute, "raymarch", RAYMARCH_KERNEL)
            .unwrap();
        let pass = RaymarchPass::new(&device, &kernel).unwrap();
        assert_eq!(pass.local_size, UVec2::new(16, 16));
        assert!(pass.bind_group.is_none());
    }

    #[test]
    fn kernel_without_main_fails_to_link() {
        let Some(device) = crate::gpu::headless_device() else {
            eprintln!("skipping: no GPU adapter available");
            return;
        };
        let kernel = ShaderService::new(&device)
            .compile(
                ShaderStage::Compute,
                "override",
                "@compute @workgroup_size(8) fn other() {}",
            )
            .unwrap();

        let err = RaymarchPass::new(&device, &kernel).err().unwrap();
        match err {
            ViewerError::ShaderCompilation { stage, label, .. } => {
                assert_eq!(stage, ShaderStage::Compute);
                assert_eq!(label, "override");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
