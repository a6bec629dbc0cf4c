//! Images read and written by FFT passes.

use wgpu::{Adapter, Device, Features, Texture, TextureFormat, TextureUsages, TextureView};

use crate::fft::PixelFormat;

/// wgpu format backing a [`PixelFormat`].
pub fn texture_format(format: PixelFormat) -> TextureFormat {
    match format {
        PixelFormat::Rg32Float => TextureFormat::Rg32Float,
        PixelFormat::Rgba16Float => TextureFormat::Rgba16Float,
        PixelFormat::R32Float => TextureFormat::R32Float,
    }
}

/// Bytes per texel of a [`PixelFormat`].
pub fn bytes_per_texel(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rg32Float | PixelFormat::Rgba16Float => 8,
        PixelFormat::R32Float => 4,
    }
}

/// Usages every FFT image needs: sampling as a pass input and copies for
/// upload and readback.
pub const REQUIRED_IMAGE_USAGES: TextureUsages = TextureUsages::TEXTURE_BINDING
    .union(TextureUsages::COPY_SRC)
    .union(TextureUsages::COPY_DST);

/// Texture usages a device allows per [`PixelFormat`].
///
/// Devices with adapter specific format features, and downlevel devices,
/// follow what the adapter reports. Others get the WebGPU guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSupport {
    rg32_float: TextureUsages,
    rgba16_float: TextureUsages,
    r32_float: TextureUsages,
}

impl ImageSupport {
    pub fn query(adapter: &Adapter, device: &Device) -> Self {
        let adapter_specific = device
            .features()
            .contains(Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
            || !adapter.get_downlevel_capabilities().is_webgpu_compliant();
        let usages = |format: PixelFormat| {
            let format = texture_format(format);
            if adapter_specific {
                adapter.get_texture_format_features(format).allowed_usages
            } else {
                format
                    .guaranteed_format_features(device.features())
                    .allowed_usages
            }
        };
        Self {
            rg32_float: usages(PixelFormat::Rg32Float),
            rgba16_float: usages(PixelFormat::Rgba16Float),
            r32_float: usages(PixelFormat::R32Float),
        }
    }

    pub fn allowed_usages(&self, format: PixelFormat) -> TextureUsages {
        match format {
            PixelFormat::Rg32Float => self.rg32_float,
            PixelFormat::Rgba16Float => self.rgba16_float,
            PixelFormat::R32Float => self.r32_float,
        }
    }

    /// Whether a compute pass can write images of `format`.
    pub fn supports_storage(&self, format: PixelFormat) -> bool {
        self.allowed_usages(format)
            .contains(TextureUsages::STORAGE_BINDING)
    }

    /// Usages to create an image of `format` with, or `None` if the format
    /// cannot even be sampled and copied.
    pub fn image_usages(&self, format: PixelFormat) -> Option<TextureUsages> {
        let allowed = self.allowed_usages(format);
        allowed
            .contains(REQUIRED_IMAGE_USAGES)
            .then(|| REQUIRED_IMAGE_USAGES | (allowed & TextureUsages::STORAGE_BINDING))
    }
}

/// A 2D image that owns both texture and view.
/// The texture must outlive its view, so we keep them together.
#[derive(Debug)]
pub struct FftImage {
    texture: Texture,
    view: TextureView,
    format: PixelFormat,
}

impl FftImage {
    /// Create an image with the given usages. See [`ImageSupport::image_usages`].
    pub fn new(
        device: &Device,
        label: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            format,
        }
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    /// Get the underlying texture (for copy operations).
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Whether passes can write this image.
    pub fn is_writable(&self) -> bool {
        self.texture.usage().contains(TextureUsages::STORAGE_BINDING)
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    /// Bytes per row as laid out in a readback buffer.
    pub fn padded_row_bytes(&self) -> u32 {
        let unpadded = self.width() * bytes_per_texel(self.format);
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unpadded.div_ceil(align) * align
    }
}
