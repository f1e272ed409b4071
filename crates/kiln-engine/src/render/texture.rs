use std::path::Path;

use anyhow::{Context, Result};

/// Sampling filter for magnification and minification.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

impl TextureFilter {
    fn mode(self) -> wgpu::FilterMode {
        match self {
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
            TextureFilter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Options for loading an image file.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct TextureOptions {
    pub filter: TextureFilter,
    /// Store the bottom row first. Texture coordinates in wgpu start top-left,
    /// so this is only needed for bottom-left UV conventions.
    pub flip_vertically: bool,
}

impl From<TextureFilter> for TextureOptions {
    fn from(filter: TextureFilter) -> Self {
        Self {
            filter,
            flip_vertically: false,
        }
    }
}

#[derive(Debug)]
struct TextureHandles {
    /// Held for the lifetime of the handle; views keep it alive after that.
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// 2D RGBA8 texture with its own clamp-to-edge sampler.
#[derive(Debug)]
pub struct Texture {
    label: String,
    /// `None` once cleared.
    gpu: Option<TextureHandles>,
    width: u32,
    height: u32,
    filter: TextureFilter,
}

impl Texture {
    /// Decodes an image file and uploads it.
    ///
    /// Any color type the decoder understands is converted to RGBA8.
    pub fn load_from_file(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: impl AsRef<Path>,
        options: impl Into<TextureOptions>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let options = options.into();

        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read texture {}", path.display()))?;
        let (width, height, pixels) = decode_rgba8(&bytes, options.flip_vertically)
            .with_context(|| format!("failed to decode texture {}", path.display()))?;

        let tex = Self::from_rgba8(
            device,
            queue,
            &path.display().to_string(),
            width,
            height,
            &pixels,
            options.filter,
        )?;
        log::info!("texture loaded: {} ({width}x{height})", path.display());
        Ok(tex)
    }

    /// Uploads tightly packed RGBA8 pixels, top row first.
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
        filter: TextureFilter,
    ) -> Result<Self> {
        check_rgba8_len(width, height, pixels.len())?;

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter.mode(),
            min_filter: filter.mode(),
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            label: label.to_string(),
            gpu: Some(TextureHandles {
                _texture: texture,
                view,
                sampler,
            }),
            width,
            height,
            filter,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn filter(&self) -> TextureFilter {
        self.filter
    }

    /// `None` once cleared.
    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.gpu.as_ref().map(|g| &g.view)
    }

    pub fn sampler(&self) -> Option<&wgpu::Sampler> {
        self.gpu.as_ref().map(|g| &g.sampler)
    }

    pub fn is_cleared(&self) -> bool {
        self.gpu.is_none()
    }

    /// Drops this handle's GPU objects. Storage is freed once no program
    /// bank still references the texture, so existing bindings stay valid.
    pub fn clear(&mut self) {
        if self.gpu.take().is_some() {
            log::debug!("texture cleared: {}", self.label);
        }
    }
}

fn check_rgba8_len(width: u32, height: u32, len: usize) -> Result<()> {
    anyhow::ensure!(width > 0 && height > 0, "texture has zero size ({width}x{height})");
    let expected = width as usize * height as usize * 4;
    anyhow::ensure!(
        len == expected,
        "texture {width}x{height} needs {expected} bytes of RGBA8, got {len}"
    );
    Ok(())
}

/// Decodes an encoded image into `(width, height, rgba8)`.
pub fn decode_rgba8(bytes: &[u8], flip_vertically: bool) -> Result<(u32, u32, Vec<u8>)> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = img.dimensions();
    let mut pixels = img.into_raw();
    if flip_vertically {
        flip_rows(&mut pixels, width as usize * 4);
    }
    Ok((width, height, pixels))
}

fn flip_rows(pixels: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = pixels.len() / row_bytes;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = pixels.split_at_mut(bottom * row_bytes);
        head[top * row_bytes..(top + 1) * row_bytes].swap_with_slice(&mut tail[..row_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(img: image::DynamicImage) -> Vec<u8> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn flip_swaps_rows() {
        let mut px = vec![1, 1, 2, 2, 3, 3];
        flip_rows(&mut px, 2);
        assert_eq!(px, [3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn rgb_images_gain_opaque_alpha() {
        let mut rgb = image::RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, image::Rgb([10, 20, 30]));
        rgb.put_pixel(1, 0, image::Rgb([40, 50, 60]));
        let png = encode_png(image::DynamicImage::ImageRgb8(rgb));

        let (w, h, px) = decode_rgba8(&png, false).unwrap();
        assert_eq!((w, h), (2, 1));
        assert_eq!(px, [10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn decode_can_flip() {
        let mut rgba = image::RgbaImage::new(1, 2);
        rgba.put_pixel(0, 0, image::Rgba([1, 2, 3, 4]));
        rgba.put_pixel(0, 1, image::Rgba([5, 6, 7, 8]));
        let png = encode_png(image::DynamicImage::ImageRgba8(rgba));

        let (_, _, px) = decode_rgba8(&png, true).unwrap();
        assert_eq!(px, [5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(decode_rgba8(b"not an image", false).is_err());
    }

    #[test]
    fn pixel_length_must_match_size() {
        assert!(check_rgba8_len(2, 2, 16).is_ok());
        assert!(check_rgba8_len(2, 2, 12).is_err());
        assert!(check_rgba8_len(0, 2, 0).is_err());
    }

    #[test]
    fn clear_drops_handles_once() {
        let (device, queue) = wgpu::Device::noop(&wgpu::DeviceDescriptor::default());
        let mut tex =
            Texture::from_rgba8(&device, &queue, "t", 2, 1, &[0; 8], TextureFilter::Nearest)
                .unwrap();
        assert!(tex.view().is_some());

        tex.clear();
        tex.clear();
        assert!(tex.is_cleared());
        assert!(tex.view().is_none());
        assert!(tex.sampler().is_none());
        assert_eq!((tex.width(), tex.height()), (2, 1));
    }

    #[test]
    fn filter_option_defaults() {
        let opts: TextureOptions = TextureFilter::Nearest.into();
        assert_eq!(opts.filter, TextureFilter::Nearest);
        assert!(!opts.flip_vertically);
        assert_eq!(TextureOptions::default().filter, TextureFilter::Linear);
    }
}
