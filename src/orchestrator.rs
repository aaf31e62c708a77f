//! Per-frame driver of the ray-marching renderer.
//!
//! [`RenderOrchestrator`] owns the GPU context, the viewer state, the camera
//! and one [`ResourceSlot`] per GPU resource. Commands queued between frames
//! are applied together at the start of the next frame; only the artefacts
//! they invalidate are rebuilt before the kernel is dispatched.

use glam::{Mat4, UVec2};

use crate::camera::SphericalCamera;
use crate::config::ViewerConfig;
use crate::error::Result;
use crate::gpu::GpuContext;
use crate::kernel::RaymarchUniforms;
use crate::present_pass::PresentPass;
use crate::raymarch_pass::RaymarchPass;
use crate::resources::{AcquisitionClock, ResourceRole, ResourceSlot, teardown};
use crate::shader::{PRESENT_SHADER, ShaderService, ShaderSource, ShaderStage};
use crate::state::{Reconfigure, ViewerCommand, ViewerState};
use crate::textures::{RenderTarget, TransferFunctionImage, VolumeImage};
use crate::transfer_function::TransferFunctionLut;

/// One step of bringing GPU resources in line with the viewer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildStep {
    ResizeSurface,
    RenderTarget,
    VolumeImage,
    TransferFunction,
    InverseModel,
    /// Point both passes at the current images.
    Rebind,
}

/// Steps `changes` requires, in the order they run.
///
/// The surface is resized before the target that matches it, and bind groups
/// are rebuilt last, only when an image was replaced.
pub fn rebuild_plan(changes: Reconfigure) -> Vec<RebuildStep> {
    let mut plan = Vec::new();
    if changes.render_target {
        plan.extend([RebuildStep::ResizeSurface, RebuildStep::RenderTarget]);
    }
    if changes.volume_image {
        plan.push(RebuildStep::VolumeImage);
    }
    if changes.transfer_function {
        plan.push(RebuildStep::TransferFunction);
    }
    if changes.transform {
        plan.push(RebuildStep::InverseModel);
    }
    if changes.images_changed() {
        plan.push(RebuildStep::Rebind);
    }
    plan
}

/// Apply every queued command to `state` in order, leaving the queue empty.
pub fn drain_commands(state: &mut ViewerState, pending: &mut Vec<ViewerCommand>) -> Reconfigure {
    pending
        .drain(..)
        .fold(Reconfigure::NONE, |changes, command| changes | state.apply(command))
}

pub struct RenderOrchestrator {
    gpu: GpuContext,
    state: ViewerState,
    camera: SphericalCamera,
    pending: Vec<ViewerCommand>,
    lut: TransferFunctionLut,
    inverse_model: Mat4,
    last_dispatch: Option<[u32; 3]>,
    clock: AcquisitionClock,
    raymarch: ResourceSlot<RaymarchPass>,
    present: ResourceSlot<PresentPass>,
    target: ResourceSlot<RenderTarget>,
    volume: ResourceSlot<VolumeImage>,
    transfer: ResourceSlot<TransferFunctionImage>,
}

impl RenderOrchestrator {
    /// Compile both programs and create every GPU resource.
    ///
    /// # Errors
    ///
    /// Fails when the kernel source cannot be read or either program fails
    /// to compile or link. The viewer has nothing to draw without them.
    pub fn new(gpu: GpuContext, config: &ViewerConfig) -> Result<Self> {
        let presets = (0..config.volume.presets.len())
            .filter_map(|i| config.preset_path(i))
            .collect();
        let state = ViewerState::new(gpu.size(), presets);
        let lut = state.control_points.lut();
        let inverse_model = state.transform.inverse_model();

        let mut orchestrator = Self {
            gpu,
            state,
            camera: config.camera(),
            pending: Vec::new(),
            lut,
            inverse_model,
            last_dispatch: None,
            clock: AcquisitionClock::new(),
            raymarch: ResourceSlot::new(ResourceRole::RaymarchProgram),
            present: ResourceSlot::new(ResourceRole::PresentProgram),
            target: ResourceSlot::new(ResourceRole::RenderTarget),
            volume: ResourceSlot::new(ResourceRole::VolumeImage),
            transfer: ResourceSlot::new(ResourceRole::TransferFunctionImage),
        };
        orchestrator.create_programs(ShaderSource::kernel(config.shader.kernel.as_deref()))?;
        orchestrator.rebuild(Reconfigure {
            render_target: true,
            volume_image: true,
            transfer_function: true,
            transform: true,
        });

        if let Some(path) = config.initial_volume() {
            orchestrator.queue(ViewerCommand::LoadDataset(path));
        }
        Ok(orchestrator)
    }

    fn create_programs(&mut self, kernel_source: ShaderSource) -> Result<()> {
        let kernel_source = kernel_source.load()?;
        let device = &self.gpu.device;
        let format = self.gpu.config.format;
        let service = ShaderService::new(device);

        self.raymarch.recreate(&mut self.clock, || {
            service
                .compile(ShaderStage::Compute, "raymarch", &kernel_source)
                .and_then(|kernel| RaymarchPass::new(device, &kernel))
        })?;
        self.present.recreate(&mut self.clock, || {
            service
                .compile(ShaderStage::Render, "present", PRESENT_SHADER)
                .and_then(|shader| PresentPass::new(device, format, &shader))
        })?;
        Ok(())
    }

    /// Queue a command for the start of the next frame.
    pub fn queue(&mut self, command: ViewerCommand) {
        log::debug!("queued {command:?}");
        self.pending.push(command);
    }

    pub fn pending(&self) -> &[ViewerCommand] {
        &self.pending
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn camera(&self) -> &SphericalCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut SphericalCamera {
        &mut self.camera
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Work-group grid of the most recent dispatch.
    pub fn last_dispatch(&self) -> Option<[u32; 3]> {
        self.last_dispatch
    }

    /// Apply every queued command and rebuild what they invalidated.
    pub fn apply_pending(&mut self) -> Reconfigure {
        let changes = drain_commands(&mut self.state, &mut self.pending);
        if !changes.is_empty() {
            log::debug!("reconfiguring: {changes:?}");
            self.rebuild(changes);
        }
        changes
    }

    fn rebuild(&mut self, changes: Reconfigure) {
        for step in rebuild_plan(changes) {
            match step {
                RebuildStep::ResizeSurface => {
                    self.gpu.resize(self.state.surface.x, self.state.surface.y);
                }
                RebuildStep::RenderTarget => {
                    let gpu = &self.gpu;
                    self.target.replace(&mut self.clock, || RenderTarget::new(gpu));
                }
                RebuildStep::VolumeImage => {
                    let gpu = &self.gpu;
                    let dataset = &self.state.dataset;
                    self.volume
                        .replace(&mut self.clock, || VolumeImage::new(gpu, dataset));
                }
                RebuildStep::TransferFunction => {
                    self.lut = self.state.control_points.lut();
                    let (gpu, lut) = (&self.gpu, &self.lut);
                    self.transfer
                        .replace(&mut self.clock, || TransferFunctionImage::new(gpu, lut));
                }
                RebuildStep::InverseModel => {
                    self.inverse_model = self.state.transform.inverse_model();
                }
                RebuildStep::Rebind => self.rebind(),
            }
        }
    }

    fn rebind(&mut self) {
        let (Some(volume), Some(transfer), Some(target)) =
            (self.volume.get(), self.transfer.get(), self.target.get())
        else {
            return;
        };
        let gpu = &self.gpu;
        if let Some(raymarch) = self.raymarch.get_mut() {
            raymarch.bind(gpu, volume, transfer, target);
        }
        if let Some(present) = self.present.get_mut() {
            present.bind(gpu, target);
        }
    }

    fn uniforms(&self) -> RaymarchUniforms {
        RaymarchUniforms::new(
            &self.camera.basis(),
            self.camera.canvas(self.gpu.aspect()),
            &self.state.slices,
            self.inverse_model,
            self.state.transform.true_size,
        )
    }

    /// Render one frame: apply pending commands, dispatch the kernel, then
    /// blit its output to the surface and present.
    pub fn frame(&mut self) {
        self.apply_pending();

        let (Some(raymarch), Some(present)) = (self.raymarch.get(), self.present.get()) else {
            return;
        };
        let gpu = &self.gpu;

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost, reconfiguring");
                gpu.reconfigure();
                return;
            }
            Err(e) => {
                log::warn!("skipping frame: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        raymarch.write_uniforms(gpu, &self.uniforms());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let surface = UVec2::new(gpu.width(), gpu.height());
        let dispatch = raymarch.dispatch(&mut encoder, surface);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            present.render(&mut render_pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.last_dispatch = dispatch;
    }

    /// Release every GPU resource, most recently acquired first.
    pub fn shutdown(&mut self) {
        let order = teardown(&mut [
            &mut self.raymarch,
            &mut self.present,
            &mut self.target,
            &mut self.volume,
            &mut self.transfer,
        ]);
        if !order.is_empty() {
            log::info!(
                "released {}",
                order
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
}

impl Drop for RenderOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn state() -> ViewerState {
        ViewerState::new(UVec2::new(800, 600), Vec::new())
    }

    fn plan_for(commands: Vec<ViewerCommand>) -> Vec<RebuildStep> {
        let mut state = state();
        let mut pending = commands;
        rebuild_plan(drain_commands(&mut state, &mut pending))
    }

    #[test]
    fn every_queued_command_is_applied() {
        let mut state = state();
        let mut pending = vec![
            ViewerCommand::SetRotation(Vec3::new(15.0, 0.0, 0.0)),
            ViewerCommand::Resize(1024, 768),
            ViewerCommand::SetOpacityPoint(40, 0.5),
            ViewerCommand::SetRotation(Vec3::new(30.0, 0.0, 0.0)),
        ];

        let changes = drain_commands(&mut state, &mut pending);

        assert!(pending.is_empty());
        assert_eq!(state.rotation(), Vec3::new(30.0, 0.0, 0.0));
        assert_eq!(state.surface, UVec2::new(1024, 768));
        assert_eq!(state.control_points.opacity[&40], 0.5);
        assert_eq!(
            changes,
            Reconfigure {
                render_target: true,
                transfer_function: true,
                transform: true,
                ..Reconfigure::NONE
            }
        );
    }

    #[test]
    fn empty_queue_plans_nothing() {
        assert!(plan_for(Vec::new()).is_empty());
    }

    #[test]
    fn rotation_replaces_no_image() {
        assert_eq!(
            plan_for(vec![ViewerCommand::SetRotation(Vec3::new(0.0, 15.0, 0.0))]),
            [RebuildStep::InverseModel]
        );
    }

    #[test]
    fn resize_replaces_only_target() {
        assert_eq!(
            plan_for(vec![ViewerCommand::Resize(640, 480)]),
            [
                RebuildStep::ResizeSurface,
                RebuildStep::RenderTarget,
                RebuildStep::Rebind
            ]
        );
    }

    #[test]
    fn palette_edit_replaces_only_transfer_function() {
        assert_eq!(
            plan_for(vec![ViewerCommand::SetColorPoint(80, Vec3::X)]),
            [RebuildStep::TransferFunction, RebuildStep::Rebind]
        );
    }

    #[test]
    fn slice_edit_plans_nothing() {
        let plan = plan_for(vec![ViewerCommand::SetSlice(crate::kernel::Axis::X, 0.2, 0.8)]);
        assert!(plan.is_empty());
    }

    #[test]
    fn rebind_runs_once_after_all_images() {
        let plan = rebuild_plan(Reconfigure {
            render_target: true,
            volume_image: true,
            transfer_function: true,
            transform: true,
        });
        assert_eq!(
            plan,
            [
                RebuildStep::ResizeSurface,
                RebuildStep::RenderTarget,
                RebuildStep::VolumeImage,
                RebuildStep::TransferFunction,
                RebuildStep::InverseModel,
                RebuildStep::Rebind
            ]
        );
    }
}
