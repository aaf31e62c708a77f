//! Shader sources and compilation.
//!
//! Both GPU programs ship embedded in the binary. The ray-marching kernel can
//! be swapped for a WGSL file named in the configuration; it is read once at
//! startup.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, ViewerError};
use crate::kernel;

/// Built-in ray-marching kernel.
pub const RAYMARCH_KERNEL: &str = include_str!("shaders/raymarch.wgsl");

/// Built-in fullscreen blit of the kernel's output.
pub const PRESENT_SHADER: &str = include_str!("shaders/present.wgsl");

/// Pipeline stage a shader module is compiled for, used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Compute,
    Vertex,
    Fragment,
    /// A module holding both a vertex and a fragment entry point.
    Render,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compute => "compute",
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Render => "render",
        };
        f.write_str(name)
    }
}

/// Where a shader's WGSL text comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShaderSource {
    Embedded(&'static str),
    File(PathBuf),
}

impl ShaderSource {
    /// The kernel source: the override file when one is configured, otherwise
    /// the built-in kernel.
    pub fn kernel(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::File(path.to_path_buf()),
            None => Self::Embedded(RAYMARCH_KERNEL),
        }
    }

    /// Read the WGSL text.
    pub fn load(&self) -> Result<String> {
        match self {
            Self::Embedded(source) => Ok((*source).to_string()),
            Self::File(path) => {
                let source =
                    std::fs::read_to_string(path).map_err(|source| ViewerError::ShaderSource {
                        path: path.clone(),
                        source,
                    })?;
                log::info!("loaded kernel override from {}", path.display());
                Ok(source)
            }
        }
    }
}

/// A successfully validated shader module.
pub struct CompiledShader {
    pub module: wgpu::ShaderModule,
    pub stage: ShaderStage,
    pub label: String,
    /// Local work-group size declared by a compute entry point.
    pub workgroup_size: Option<[u32; 3]>,
}

/// Compiles WGSL into shader modules and links them into pipelines, turning
/// validation failures into errors instead of device-lost panics.
pub struct ShaderService<'a> {
    device: &'a wgpu::Device,
}

impl<'a> ShaderService<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device }
    }

    /// Compile `source`, returning the validation log on failure.
    pub fn compile(&self, stage: ShaderStage, label: &str, source: &str) -> Result<CompiledShader> {
        let module = self.validated(stage, label, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        let workgroup_size = match stage {
            ShaderStage::Compute => kernel::declared_workgroup_size(source),
            _ => None,
        };
        log::debug!("compiled {stage} shader '{label}'");

        Ok(CompiledShader {
            module,
            stage,
            label: label.to_string(),
            workgroup_size,
        })
    }

    /// Build a pipeline from `shader`, returning the validation log when its
    /// entry points or bindings do not match the layout.
    pub fn link<T>(
        &self,
        shader: &CompiledShader,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T> {
        let pipeline = self.validated(shader.stage, &shader.label, create)?;
        log::debug!("linked {} pipeline '{}'", shader.stage, shader.label);
        Ok(pipeline)
    }

    fn validated<T>(
        &self,
        stage: ShaderStage,
        label: &str,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(ViewerError::ShaderCompilation {
                stage,
                label: label.to_string(),
                log: error.to_string(),
            }),
            None => Ok(value),
        }
    }
}
