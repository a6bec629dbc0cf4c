//! GPU execution using wgpu.
//!
//! Opens a headless device (Metal on macOS, Vulkan or GL elsewhere) and runs
//! FFT plans on it through [`WgpuBackend`].

pub mod compute;
pub mod context;
pub mod textures;

pub use compute::{GpuResource, WgpuBackend, WgpuError, WgpuProgram};
pub use context::{GpuContext, GpuError};
pub use textures::{FftImage, ImageSupport};
