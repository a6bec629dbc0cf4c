//! Bind group layouts and compute pipelines for FFT programs.

use wgpu::{BindGroupLayout, ComputePipeline, Device, ShaderModule};

use crate::fft::{Direction, ShaderVariant, Target};
use crate::gpu::textures::texture_format;

fn input_entry(binding: u32, target: Target) -> wgpu::BindGroupLayoutEntry {
    let ty = if target.is_image() {
        wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        }
    } else {
        wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

fn output_entry(variant: &ShaderVariant) -> wgpu::BindGroupLayoutEntry {
    let params = &variant.parameters;
    let ty = match crate::fft::PixelFormat::for_output(params.mode, params.output_target) {
        Some(format) => wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: texture_format(format),
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        None => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding: 1,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

/// Layout matching the bindings emitted for `variant`: input, output,
/// uniforms and, for convolving passes, the auxiliary input.
pub fn create_layout(device: &Device, variant: &ShaderVariant) -> BindGroupLayout {
    let params = &variant.parameters;
    let mut entries = vec![
        input_entry(0, params.input_target),
        output_entry(variant),
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ];
    if params.direction == Direction::InverseConvolve {
        entries.push(input_entry(3, params.input_target));
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{}_layout", variant.label())),
        entries: &entries,
    })
}

pub fn create_pipeline(
    device: &Device,
    shader: &ShaderModule,
    layout: &BindGroupLayout,
    label: &str,
) -> ComputePipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{}_pipeline_layout", label)),
        bind_group_layouts: &[layout],
        immediate_size: 0,
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{}_pipeline", label)),
        layout: Some(&pipeline_layout),
        module: shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}
