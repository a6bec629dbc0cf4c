//! wgpu compute backend for FFT plans.
//!
//! Each pass variant becomes one WGSL module with its own bind group layout;
//! see [`crate::fft::wgsl`] for the generated kernels.

mod buffers;
mod pipelines;

pub mod backend;

pub use backend::{GpuResource, WgpuBackend, WgpuError, WgpuProgram};
