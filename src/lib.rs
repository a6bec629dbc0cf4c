//! Ocean FFT Core
//!
//! GPU FFT planning and execution for ocean water simulation.
//!
//! # Features
//!
//! - Radix 4/8/16/64 Stockham passes generated as WGSL compute shaders
//! - Complex, dual complex and real transforms in 1D and 2D
//! - Cost-model planning steered by learned or loaded wisdom
//! - wgpu execution (Metal on macOS, Vulkan on Linux)
//! - A CPU reference backend with identical pass semantics

pub mod fft;
pub mod gpu;
pub mod host;

// Re-export commonly used types
pub use fft::{
    ComputeBackend, Direction, FftError, FftOptions, FftPlan, FftPlanBuilder, PerformanceOptions,
    ProgramCache, Target, TransformDesc, TransformKind, Wisdom,
};
pub use gpu::{GpuContext, WgpuBackend};
pub use host::HostBackend;
