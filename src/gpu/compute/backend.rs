//! [`ComputeBackend`] on top of wgpu.
//!
//! Dispatches are recorded into compute passes and only submitted on
//! [`ComputeBackend::finish`] or a readback. A memory barrier closes the
//! current pass; wgpu inserts the actual resource transitions between passes.

use std::fmt;
use std::sync::Arc;

use wgpu::{Adapter, BindGroupLayout, Buffer, ComputePipeline, Device, Queue};

use super::{buffers, pipelines};
use crate::fft::{
    wgsl, Barrier, BufferDesc, ComputeBackend, Direction, ImageDesc, InputSlot, PassUniforms,
    PixelFormat, ShaderVariant, Target,
};
use crate::gpu::textures::{bytes_per_texel, FftImage, ImageSupport};
use crate::gpu::GpuContext;

#[derive(Debug, thiserror::Error)]
pub enum WgpuError {
    #[error("Shader {label} failed to compile: {message}")]
    Compile { label: String, message: String },
    #[error("No {0} bound")]
    Unbound(&'static str),
    #[error("Resource does not match the bound target: {0}")]
    WrongResource(String),
    #[error("Input and output are the same resource")]
    Aliased,
    #[error("Data of {got} floats does not fit a resource of {expected}")]
    SizeMismatch { expected: usize, got: usize },
    #[error("GPU buffer mapping failed: {0}")]
    BufferMapFailed(String),
    #[error("Device poll failed: {0}")]
    Poll(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// A buffer or image owned by the device.
#[derive(Debug, Clone)]
pub enum GpuResource {
    Buffer(Arc<Buffer>),
    Image(Arc<FftImage>),
}

impl GpuResource {
    pub fn is_image(&self) -> bool {
        matches!(self, GpuResource::Image(_))
    }

    fn same(&self, other: &GpuResource) -> bool {
        match (self, other) {
            (GpuResource::Buffer(a), GpuResource::Buffer(b)) => Arc::ptr_eq(a, b),
            (GpuResource::Image(a), GpuResource::Image(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn binding(&self) -> wgpu::BindingResource<'_> {
        match self {
            GpuResource::Buffer(buffer) => buffer.as_entire_binding(),
            GpuResource::Image(image) => wgpu::BindingResource::TextureView(image.view()),
        }
    }
}

/// A compiled pass program and the layout its bind groups are built against.
#[derive(Clone)]
pub struct WgpuProgram {
    id: u64,
    label: String,
    convolve: bool,
    pipeline: Arc<ComputePipeline>,
    layout: Arc<BindGroupLayout>,
}

impl WgpuProgram {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for WgpuProgram {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for WgpuProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuProgram")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

struct RecordedDispatch {
    pipeline: Arc<ComputePipeline>,
    bind_group: wgpu::BindGroup,
    groups_x: u32,
    groups_y: u32,
}

/// Runs FFT passes on a wgpu device.
pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    next_id: u64,
    program: Option<WgpuProgram>,
    input: Option<GpuResource>,
    aux: Option<GpuResource>,
    output: Option<GpuResource>,
    recorded: Vec<RecordedDispatch>,
    encoder: Option<wgpu::CommandEncoder>,
    dispatches: u64,
    image_support: ImageSupport,
}

impl WgpuBackend {
    pub fn new(adapter: &Adapter, device: Arc<Device>, queue: Arc<Queue>) -> Self {
        let image_support = ImageSupport::query(adapter, &device);
        Self {
            device,
            queue,
            next_id: 0,
            program: None,
            input: None,
            aux: None,
            output: None,
            recorded: Vec::new(),
            encoder: None,
            dispatches: 0,
            image_support,
        }
    }

    pub fn from_context(ctx: &GpuContext) -> Self {
        Self::new(&ctx.adapter, Arc::clone(&ctx.device), Arc::clone(&ctx.queue))
    }

    /// Texture usages this device allows per image format.
    pub fn image_support(&self) -> &ImageSupport {
        &self.image_support
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Dispatches recorded over the backend's lifetime.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches
    }

    /// A storage buffer initialised with `data`.
    pub fn buffer_from(&self, label: &str, data: &[f32]) -> GpuResource {
        GpuResource::Buffer(Arc::new(buffers::create_storage_buffer_init(
            &self.device,
            label,
            data,
        )))
    }

    /// Overwrites a resource with `data`: raw floats for a buffer, row-major
    /// texels for an `f32` image.
    pub fn upload(&mut self, resource: &GpuResource, data: &[f32]) -> Result<(), WgpuError> {
        // Work recorded earlier must see the old contents.
        self.submit();
        match resource {
            GpuResource::Buffer(buffer) => {
                let capacity = (buffer.size() / 4) as usize;
                if data.len() > capacity {
                    return Err(WgpuError::SizeMismatch {
                        expected: capacity,
                        got: data.len(),
                    });
                }
                self.queue
                    .write_buffer(buffer, 0, bytemuck::cast_slice(data));
            }
            GpuResource::Image(image) => {
                let channels = f32_channels(image.format())?;
                let (width, height) = (image.width(), image.height());
                let expected = (width * height * channels) as usize;
                if data.len() != expected {
                    return Err(WgpuError::SizeMismatch {
                        expected,
                        got: data.len(),
                    });
                }
                self.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: image.texture(),
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    bytemuck::cast_slice(data),
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(width * bytes_per_texel(image.format())),
                        rows_per_image: Some(height),
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }
        Ok(())
    }

    /// Waits for all recorded work and copies a resource back.
    pub fn read(&mut self, resource: &GpuResource) -> Result<Vec<f32>, WgpuError> {
        self.submit();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fft_readback_encoder"),
            });

        match resource {
            GpuResource::Buffer(buffer) => {
                let staging = buffers::create_staging_buffer(&self.device, buffer.size());
                encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
                self.queue.submit(Some(encoder.finish()));
                self.read_staging(&staging)
            }
            GpuResource::Image(image) => {
                let channels = f32_channels(image.format())?;
                let (width, height) = (image.width(), image.height());
                let padded_row_bytes = image.padded_row_bytes();
                let staging = buffers::create_staging_buffer(
                    &self.device,
                    u64::from(padded_row_bytes) * u64::from(height),
                );
                encoder.copy_texture_to_buffer(
                    wgpu::TexelCopyTextureInfo {
                        texture: image.texture(),
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    wgpu::TexelCopyBufferInfo {
                        buffer: &staging,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: 0,
                            bytes_per_row: Some(padded_row_bytes),
                            rows_per_image: Some(height),
                        },
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
                self.queue.submit(Some(encoder.finish()));

                let padded = self.read_staging(&staging)?;
                let row_floats = (padded_row_bytes / 4) as usize;
                let texels = (width * channels) as usize;
                Ok(padded
                    .chunks(row_floats)
                    .flat_map(|row| row[..texels].iter().copied())
                    .collect())
            }
        }
    }

    fn read_staging(&self, staging: &Buffer) -> Result<Vec<f32>, WgpuError> {
        let slice = staging.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.poll()?;

        rx.recv()
            .map_err(|e| WgpuError::BufferMapFailed(e.to_string()))?
            .map_err(|e| WgpuError::BufferMapFailed(format!("{:?}", e)))?;

        let data = slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(result)
    }

    fn poll(&self) -> Result<(), WgpuError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| WgpuError::Poll(format!("{:?}", e)))
    }

    /// Encodes the dispatches recorded since the last barrier as one compute pass.
    fn close_pass(&mut self) {
        if self.recorded.is_empty() {
            return;
        }
        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fft_encoder"),
            })
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("fft_pass"),
            timestamp_writes: None,
        });
        for dispatch in self.recorded.drain(..) {
            pass.set_pipeline(&dispatch.pipeline);
            pass.set_bind_group(0, &dispatch.bind_group, &[]);
            pass.dispatch_workgroups(dispatch.groups_x, dispatch.groups_y, 1);
        }
    }

    /// Submits everything recorded so far without waiting.
    pub fn submit(&mut self) {
        self.close_pass();
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn check_target(target: Target, resource: &GpuResource) -> Result<(), WgpuError> {
        if target.is_image() != resource.is_image() {
            return Err(WgpuError::WrongResource(format!(
                "{target:?} bound to a {}",
                if target.is_image() { "buffer" } else { "image" }
            )));
        }
        Ok(())
    }
}

/// Channels of an image format that reads back as plain `f32`.
fn f32_channels(format: PixelFormat) -> Result<u32, WgpuError> {
    match format {
        PixelFormat::Rg32Float => Ok(2),
        PixelFormat::R32Float => Ok(1),
        PixelFormat::Rgba16Float => Err(WgpuError::Unsupported(
            "host transfer of rgba16float images".into(),
        )),
    }
}

impl ComputeBackend for WgpuBackend {
    type Program = WgpuProgram;
    type Resource = GpuResource;
    type Error = WgpuError;

    fn compile_program(&mut self, variant: &ShaderVariant) -> Result<WgpuProgram, WgpuError> {
        let label = variant.label();
        let source = wgsl::generate(variant);

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| m.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(WgpuError::Compile {
                label,
                message: errors.join("; "),
            });
        }

        let params = &variant.parameters;
        if let Some(format) = PixelFormat::for_output(params.mode, params.output_target) {
            if !self.image_support.supports_storage(format) {
                return Err(WgpuError::Unsupported(format!(
                    "{format:?} images cannot be written by compute passes on this device"
                )));
            }
        }

        let layout = pipelines::create_layout(&self.device, variant);
        let pipeline = pipelines::create_pipeline(&self.device, &module, &layout, &label);

        let program = WgpuProgram {
            id: self.next_id,
            label,
            convolve: variant.parameters.direction == Direction::InverseConvolve,
            pipeline: Arc::new(pipeline),
            layout: Arc::new(layout),
        };
        self.next_id += 1;
        log::debug!("Compiled {}", program.label);
        Ok(program)
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<GpuResource, WgpuError> {
        Ok(GpuResource::Buffer(Arc::new(buffers::create_storage_buffer(
            &self.device,
            &desc.label,
            desc.size_in_bytes(),
        ))))
    }

    fn create_image(&mut self, desc: &ImageDesc) -> Result<GpuResource, WgpuError> {
        let usage = self.image_support.image_usages(desc.format).ok_or_else(|| {
            WgpuError::Unsupported(format!("{:?} images on this device", desc.format))
        })?;
        Ok(GpuResource::Image(Arc::new(FftImage::new(
            &self.device,
            &desc.label,
            desc.width,
            desc.height,
            desc.format,
            usage,
        ))))
    }

    fn bind_program(&mut self, program: &WgpuProgram) -> Result<(), WgpuError> {
        self.program = Some(program.clone());
        Ok(())
    }

    fn bind_input(
        &mut self,
        slot: InputSlot,
        target: Target,
        resource: &GpuResource,
    ) -> Result<(), WgpuError> {
        Self::check_target(target, resource)?;
        match slot {
            InputSlot::Primary => self.input = Some(resource.clone()),
            InputSlot::Aux => self.aux = Some(resource.clone()),
        }
        Ok(())
    }

    fn bind_output(
        &mut self,
        target: Target,
        format: Option<PixelFormat>,
        resource: &GpuResource,
    ) -> Result<(), WgpuError> {
        Self::check_target(target, resource)?;
        if let (Some(format), GpuResource::Image(image)) = (format, resource) {
            if image.format() != format {
                return Err(WgpuError::WrongResource(format!(
                    "{format:?} output bound to a {:?} image",
                    image.format()
                )));
            }
            if !image.is_writable() {
                return Err(WgpuError::Unsupported(format!(
                    "{format:?} image cannot be a pass output on this device"
                )));
            }
        }
        self.output = Some(resource.clone());
        Ok(())
    }

    fn dispatch(
        &mut self,
        uniforms: &PassUniforms,
        groups_x: u32,
        groups_y: u32,
    ) -> Result<(), WgpuError> {
        let program = self.program.as_ref().ok_or(WgpuError::Unbound("program"))?;
        let input = self.input.as_ref().ok_or(WgpuError::Unbound("input"))?;
        let output = self.output.as_ref().ok_or(WgpuError::Unbound("output"))?;
        if input.same(output) || self.aux.as_ref().is_some_and(|a| a.same(output)) {
            return Err(WgpuError::Aliased);
        }

        let uniform_buffer = buffers::create_uniform_buffer(&self.device, uniforms);
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: input.binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: output.binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform_buffer.as_entire_binding(),
            },
        ];
        if program.convolve {
            let aux = self
                .aux
                .as_ref()
                .ok_or(WgpuError::Unbound("auxiliary input"))?;
            entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: aux.binding(),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_bind_group", program.label)),
            layout: &program.layout,
            entries: &entries,
        });

        self.recorded.push(RecordedDispatch {
            pipeline: Arc::clone(&program.pipeline),
            bind_group,
            groups_x,
            groups_y,
        });
        self.dispatches += 1;
        Ok(())
    }

    fn memory_barrier(&mut self, barrier: Barrier) -> Result<(), WgpuError> {
        log::trace!("Barrier {:?} closes compute pass", barrier);
        self.close_pass();
        Ok(())
    }

    fn finish(&mut self) -> Result<(), WgpuError> {
        self.submit();
        self.poll()
    }
}
