//! The graphics API boundary.
//!
//! Planning and execution only ever talk to the GPU through this trait.
//! Binding state is sticky, as in GL: a bound program or resource stays
//! bound until replaced.

use std::fmt;

use super::shader::ShaderVariant;
use super::types::{Barrier, PassUniforms, PixelFormat, Target};

/// Which input binding a resource goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSlot {
    Primary,
    /// Second operand of a convolving first pass.
    Aux,
}

/// Storage buffer request, in elements rather than bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: String,
    /// Number of complex (or dual complex) elements.
    pub elements: u64,
    /// Floats per element: 2 for complex, 4 for dual.
    pub components: u32,
    /// Elements are stored as packed fp16 pairs.
    pub fp16: bool,
}

impl BufferDesc {
    pub fn size_in_bytes(&self) -> u64 {
        let bytes_per_float = if self.fp16 { 2 } else { 4 };
        self.elements * u64::from(self.components) * bytes_per_float
    }
}

/// 2D image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// A device capable of compiling and dispatching FFT passes.
pub trait ComputeBackend {
    /// Handle of a compiled program. Equality means "same program".
    type Program: Clone + PartialEq + fmt::Debug;
    /// Opaque buffer or image handle.
    type Resource;
    type Error: std::error::Error + Send + Sync + 'static;

    fn compile_program(&mut self, variant: &ShaderVariant) -> Result<Self::Program, Self::Error>;

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Self::Resource, Self::Error>;

    fn create_image(&mut self, desc: &ImageDesc) -> Result<Self::Resource, Self::Error>;

    fn bind_program(&mut self, program: &Self::Program) -> Result<(), Self::Error>;

    /// Binds a sampled image when `target` is an image, a storage buffer otherwise.
    fn bind_input(
        &mut self,
        slot: InputSlot,
        target: Target,
        resource: &Self::Resource,
    ) -> Result<(), Self::Error>;

    /// Binds a writable image with `format` when `target` is an image.
    fn bind_output(
        &mut self,
        target: Target,
        format: Option<PixelFormat>,
        resource: &Self::Resource,
    ) -> Result<(), Self::Error>;

    fn dispatch(
        &mut self,
        uniforms: &PassUniforms,
        groups_x: u32,
        groups_y: u32,
    ) -> Result<(), Self::Error>;

    fn memory_barrier(&mut self, barrier: Barrier) -> Result<(), Self::Error>;

    /// Blocks until all recorded work has completed.
    fn finish(&mut self) -> Result<(), Self::Error>;
}
