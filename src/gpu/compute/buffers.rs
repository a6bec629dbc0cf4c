//! GPU buffer management for FFT passes.

use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferUsages, Device};

use crate::fft::PassUniforms;

/// Storage buffer a pass can read, write and copy.
pub fn create_storage_buffer(device: &Device, label: &str, size: u64) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        // Room for at least one dual element.
        size: size.max(16),
        usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Storage buffer initialised with `data`.
pub fn create_storage_buffer_init(device: &Device, label: &str, data: &[f32]) -> Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
    })
}

/// Per-dispatch uniform block.
pub fn create_uniform_buffer(device: &Device, uniforms: &PassUniforms) -> Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("fft_pass_uniforms"),
        contents: bytemuck::bytes_of(uniforms),
        usage: BufferUsages::UNIFORM,
    })
}

/// Mappable buffer a copy can land in.
pub fn create_staging_buffer(device: &Device, size: u64) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("fft_staging"),
        size,
        usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
