//! CPU reference backend.
//!
//! [`HostBackend`] executes passes on host memory with the exact index
//! arithmetic of the generated kernels. It records every bind, dispatch and
//! barrier so tests can check how a plan drives a device.
//!
//! Storage is always `f32`: packed fp16 flags change nothing here.

mod kernels;

use std::cell::RefCell;
use std::rc::Rc;

use rustfft::FftPlanner;

use crate::fft::{
    Barrier, BufferDesc, ComputeBackend, ImageDesc, InputSlot, Parameters, PassUniforms,
    PixelFormat, ShaderVariant, Target,
};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Access at {index} past the end of a {len} float buffer")]
    OutOfBounds { index: usize, len: usize },
    #[error("No {0} bound")]
    Unbound(&'static str),
    #[error("Resource does not match the bound target: {0}")]
    WrongResource(String),
    #[error("Input and output are the same resource")]
    Aliased,
    #[error("Unsupported program: {0}")]
    Unsupported(String),
}

/// Contents of a host resource.
#[derive(Debug, Clone, PartialEq)]
pub enum HostStorage {
    Buffer(Vec<f32>),
    Image {
        width: u32,
        height: u32,
        channels: u32,
        data: Vec<f32>,
    },
}

impl HostStorage {
    pub fn is_image(&self) -> bool {
        matches!(self, HostStorage::Image { .. })
    }

    /// Channel `c` of texel `(x, y)`, zero outside the image.
    pub fn texel(&self, x: u32, y: u32, c: u32) -> f32 {
        match self {
            HostStorage::Image {
                width,
                height,
                channels,
                data,
            } if x < *width && y < *height && c < *channels => {
                data[((y * width + x) * channels + c) as usize]
            }
            _ => 0.0,
        }
    }

    /// Writes outside the image are ignored.
    pub fn set_texel(&mut self, x: u32, y: u32, c: u32, value: f32) {
        if let HostStorage::Image {
            width,
            height,
            channels,
            data,
        } = self
        {
            if x < *width && y < *height && c < *channels {
                data[((y * *width + x) * *channels + c) as usize] = value;
            }
        }
    }

    /// Raw floats, row-major and channel-interleaved for images.
    pub fn floats(&self) -> &[f32] {
        match self {
            HostStorage::Buffer(data) | HostStorage::Image { data, .. } => data,
        }
    }
}

pub type HostResource = Rc<RefCell<HostStorage>>;

/// Compiled program handle.
#[derive(Debug, Clone, PartialEq)]
pub struct HostProgram {
    id: u32,
    parameters: Parameters,
}

impl HostProgram {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

/// A recorded device command.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    BindProgram(u32),
    Dispatch {
        program: u32,
        uniforms: PassUniforms,
        groups_x: u32,
        groups_y: u32,
    },
    Barrier(Barrier),
}

/// Executes FFT passes on the CPU.
pub struct HostBackend {
    planner: FftPlanner<f32>,
    next_id: u32,
    program: Option<HostProgram>,
    input: Option<HostResource>,
    aux: Option<HostResource>,
    output: Option<HostResource>,
    commands: Vec<HostCommand>,
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            next_id: 0,
            program: None,
            input: None,
            aux: None,
            output: None,
            commands: Vec::new(),
        }
    }

    /// A buffer initialised with `data`.
    pub fn buffer_from(data: Vec<f32>) -> HostResource {
        Rc::new(RefCell::new(HostStorage::Buffer(data)))
    }

    /// An image initialised with `data`, `channels` floats per texel.
    pub fn image_from(width: u32, height: u32, channels: u32, data: Vec<f32>) -> HostResource {
        debug_assert_eq!(data.len(), (width * height * channels) as usize);
        Rc::new(RefCell::new(HostStorage::Image {
            width,
            height,
            channels,
            data,
        }))
    }

    /// Copy of a resource's floats.
    pub fn read(resource: &HostResource) -> Vec<f32> {
        resource.borrow().floats().to_vec()
    }

    pub fn commands(&self) -> &[HostCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Programs compiled over the backend's lifetime.
    pub fn compilations(&self) -> u32 {
        self.next_id
    }

    pub fn dispatch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, HostCommand::Dispatch { .. }))
            .count()
    }

    pub fn barrier_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, HostCommand::Barrier(_)))
            .count()
    }

    fn check_target(target: Target, resource: &HostResource) -> Result<(), HostError> {
        if target.is_image() != resource.borrow().is_image() {
            return Err(HostError::WrongResource(format!(
                "{target:?} bound to a {}",
                if target.is_image() { "buffer" } else { "image" }
            )));
        }
        Ok(())
    }
}

fn channels(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rg32Float => 2,
        PixelFormat::Rgba16Float => 4,
        PixelFormat::R32Float => 1,
    }
}

impl ComputeBackend for HostBackend {
    type Program = HostProgram;
    type Resource = HostResource;
    type Error = HostError;

    fn compile_program(&mut self, variant: &ShaderVariant) -> Result<HostProgram, HostError> {
        let params = &variant.parameters;
        if !params.mode.is_resolve()
            && !(params.radix.is_power_of_two() && (2..=64).contains(&params.radix))
        {
            return Err(HostError::Unsupported(format!("radix {}", params.radix)));
        }
        if !matches!(variant.vector_size(), 2 | 4 | 8) {
            return Err(HostError::Unsupported(format!(
                "vector size {}",
                variant.vector_size()
            )));
        }
        if params.workgroup_size.invocations() == 0 {
            return Err(HostError::Unsupported("empty workgroup".into()));
        }

        let program = HostProgram {
            id: self.next_id,
            parameters: *params,
        };
        self.next_id += 1;
        Ok(program)
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<HostResource, HostError> {
        let floats = desc.elements as usize * desc.components as usize;
        Ok(Self::buffer_from(vec![0.0; floats]))
    }

    fn create_image(&mut self, desc: &ImageDesc) -> Result<HostResource, HostError> {
        let channels = channels(desc.format);
        let floats = (desc.width * desc.height * channels) as usize;
        Ok(Self::image_from(
            desc.width,
            desc.height,
            channels,
            vec![0.0; floats],
        ))
    }

    fn bind_program(&mut self, program: &HostProgram) -> Result<(), HostError> {
        self.commands.push(HostCommand::BindProgram(program.id));
        self.program = Some(program.clone());
        Ok(())
    }

    fn bind_input(
        &mut self,
        slot: InputSlot,
        target: Target,
        resource: &HostResource,
    ) -> Result<(), HostError> {
        Self::check_target(target, resource)?;
        match slot {
            InputSlot::Primary => self.input = Some(Rc::clone(resource)),
            InputSlot::Aux => self.aux = Some(Rc::clone(resource)),
        }
        Ok(())
    }

    fn bind_output(
        &mut self,
        target: Target,
        format: Option<PixelFormat>,
        resource: &HostResource,
    ) -> Result<(), HostError> {
        Self::check_target(target, resource)?;
        if let (Some(format), HostStorage::Image { channels: have, .. }) =
            (format, &*resource.borrow())
        {
            if channels(format) > *have {
                return Err(HostError::WrongResource(format!(
                    "{format:?} output needs {} channels, image has {have}",
                    channels(format)
                )));
            }
        }
        self.output = Some(Rc::clone(resource));
        Ok(())
    }

    fn dispatch(
        &mut self,
        uniforms: &PassUniforms,
        groups_x: u32,
        groups_y: u32,
    ) -> Result<(), HostError> {
        let program = self.program.as_ref().ok_or(HostError::Unbound("program"))?;
        let input = self.input.as_ref().ok_or(HostError::Unbound("input"))?;
        let output = self.output.as_ref().ok_or(HostError::Unbound("output"))?;
        if Rc::ptr_eq(input, output) || self.aux.as_ref().is_some_and(|a| Rc::ptr_eq(a, output)) {
            return Err(HostError::Aliased);
        }

        self.commands.push(HostCommand::Dispatch {
            program: program.id,
            uniforms: *uniforms,
            groups_x,
            groups_y,
        });

        let input = input.borrow();
        let aux = self.aux.as_ref().map(|a| a.borrow());
        let mut output = output.borrow_mut();
        kernels::Dispatch {
            params: &program.parameters,
            uniforms,
            input: &input,
            aux: aux.as_deref(),
            output: &mut output,
            groups_x,
            groups_y,
        }
        .run(&mut self.planner)
    }

    fn memory_barrier(&mut self, barrier: Barrier) -> Result<(), HostError> {
        self.commands.push(HostCommand::Barrier(barrier));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), HostError> {
        Ok(())
    }
}
