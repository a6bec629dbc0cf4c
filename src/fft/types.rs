//! Core descriptors shared by planning, caching and execution.
//!
//! `Parameters` is the identity of a compiled program: two passes with equal
//! parameters share one program, any differing field means a distinct variant.

use serde::{Deserialize, Serialize};

/// Transform direction. The sign of the twiddle exponent follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    /// Inverse transform whose first pass multiplies the input by an auxiliary
    /// frequency-domain input, i.e. a convolution.
    InverseConvolve,
    Inverse,
}

impl Direction {
    /// Sign of the twiddle angle, `-1` for forward transforms.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Forward => -1.0,
            Direction::Inverse | Direction::InverseConvolve => 1.0,
        }
    }
}

/// What a single pass does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Horizontal,
    HorizontalDual,
    Vertical,
    VerticalDual,
    ResolveRealToComplex,
    ResolveComplexToReal,
}

impl Mode {
    pub fn is_dual(self) -> bool {
        matches!(self, Mode::HorizontalDual | Mode::VerticalDual)
    }

    pub fn is_resolve(self) -> bool {
        matches!(self, Mode::ResolveRealToComplex | Mode::ResolveComplexToReal)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Mode::Vertical | Mode::VerticalDual)
    }

    /// Float components carried per element: 4 for dual, 2 otherwise.
    pub fn components(self) -> u32 {
        if self.is_dual() {
            4
        } else {
            2
        }
    }
}

/// The transform a plan implements end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformKind {
    ComplexToComplex,
    /// Two independent complex transforms packed per element (e.g. RGBA data).
    ComplexToComplexDual,
    /// N / 2 + 1 complex values per row in, stride of N complex samples.
    ComplexToReal,
    /// N / 2 + 1 complex values per row out, stride of N complex samples.
    RealToComplex,
}

impl TransformKind {
    pub fn needs_resolve(self) -> bool {
        matches!(self, TransformKind::ComplexToReal | TransformKind::RealToComplex)
    }

    pub fn components(self) -> u32 {
        match self {
            TransformKind::ComplexToComplexDual => 4,
            _ => 2,
        }
    }
}

/// Where a pass reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// A flat storage buffer.
    LinearBuffer,
    /// A 2D image holding complex values (RG, or RGBA for dual transforms).
    Image,
    /// A 2D image holding a single real channel.
    RealImage,
}

impl Target {
    pub fn is_image(self) -> bool {
        !matches!(self, Target::LinearBuffer)
    }
}

/// Pixel formats used when a pass writes an image target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rg32Float,
    Rgba16Float,
    R32Float,
}

impl PixelFormat {
    /// Output format implied by the pass mode and target, `None` for buffers.
    pub fn for_output(mode: Mode, target: Target) -> Option<Self> {
        match target {
            Target::LinearBuffer => None,
            Target::RealImage => Some(PixelFormat::R32Float),
            Target::Image => Some(match mode {
                Mode::HorizontalDual | Mode::VerticalDual => PixelFormat::Rgba16Float,
                Mode::Horizontal
                | Mode::Vertical
                | Mode::ResolveRealToComplex
                | Mode::ResolveComplexToReal => PixelFormat::Rg32Float,
            }),
        }
    }
}

/// Memory barrier a pass requires after its dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Barrier {
    /// Storage writes must be visible to the next dispatch.
    ShaderStorage,
    /// Every outstanding GPU write must be visible.
    All,
}

/// Numeric precision flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionOptions {
    /// Run the butterflies in half precision.
    pub fp16: bool,
    /// Input buffers hold packed 2 x fp16 values instead of fp32.
    pub input_fp16: bool,
    /// Output buffers hold packed 2 x fp16 values instead of fp32.
    pub output_fp16: bool,
    /// Apply the 1 / N normalization factor.
    pub normalize: bool,
}

/// Local workgroup shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl WorkgroupSize {
    pub fn invocations(&self) -> u32 {
        self.x * self.y * self.z
    }
}

/// Program identity.
///
/// Dispatch grid and program handle live on the pass, not here: they are
/// derived and must not split the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameters {
    pub workgroup_size: WorkgroupSize,
    pub radix: u32,
    pub vector_size: u32,
    pub direction: Direction,
    pub mode: Mode,
    pub input_target: Target,
    pub output_target: Target,
    /// First stage of an axis (stride product p == 1), twiddles are skipped.
    pub first_stage: bool,
    /// Half-spectrum pass: transforms N / 2 + 1 columns over a 2N stride.
    pub pow2_stride: bool,
    pub shared_banked: bool,
    pub precision: PrecisionOptions,
}

/// Per-dispatch uniform block.
///
/// WGSL: struct PassUniforms { p: u32, width: u32, height: u32, _pad: u32 }
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PassUniforms {
    /// Product of the radices applied before this pass on the same axis.
    pub p: u32,
    /// Complex-domain width of the transform.
    pub width: u32,
    pub height: u32,
    pub _pad: u32,
}

impl PassUniforms {
    pub fn new(p: u32, width: u32, height: u32) -> Self {
        Self {
            p,
            width,
            height,
            _pad: 0,
        }
    }
}
