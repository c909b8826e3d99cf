use std::path::{Path, PathBuf};

use image::imageops::flip_vertical_in_place;
use image::RgbaImage;
use thiserror::Error;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::CHANNEL_COUNT;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const SAMPLER_BINDING: u32 = CHANNEL_COUNT as u32;

/// Why a channel image could not be turned into a texture.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("could not read texture {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode texture {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture {} has {channels} colour channels; expected 3 (RGB) or 4 (RGBA)", .path.display())]
    UnsupportedChannels { path: PathBuf, channels: u8 },
    #[error("texture {} has no pixels", .path.display())]
    Empty { path: PathBuf },
    #[error("texture {} is {width}x{height}, larger than the device limit of {limit}", .path.display())]
    TooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        limit: u32,
    },
}

/// Pixels of one image, flipped so row 0 is the bottom of the picture.
pub struct DecodedTexture {
    pub width: u32,
    pub height: u32,
    /// Colour channels the file declared before expansion to RGBA.
    pub channels: u8,
    pixels: RgbaImage,
}

/// Decodes `path` into RGBA8, accepting only 3- and 4-channel sources.
pub fn decode_texture(path: &Path) -> Result<DecodedTexture, TextureError> {
    let bytes = std::fs::read(path).map_err(|source| TextureError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    drop(bytes);

    let channels = image.color().channel_count();
    if !matches!(channels, 3 | 4) {
        return Err(TextureError::UnsupportedChannels {
            path: path.to_path_buf(),
            channels,
        });
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(TextureError::Empty {
            path: path.to_path_buf(),
        });
    }

    let mut pixels = image.into_rgba8();
    flip_vertical_in_place(&mut pixels);
    Ok(DecodedTexture {
        width: pixels.width(),
        height: pixels.height(),
        channels,
        pixels,
    })
}

/// GPU copy of one channel image.
pub(crate) struct ChannelTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl ChannelTexture {
    pub fn resolution(&self) -> [f32; 4] {
        [self.width as f32, self.height as f32, 0.0, 0.0]
    }
}

/// Uploads `decoded` for `channel`; the pixel buffer is dropped on return.
pub(crate) fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    channel: usize,
    path: &Path,
    decoded: DecodedTexture,
) -> Result<ChannelTexture, TextureError> {
    let limit = device.limits().max_texture_dimension_2d;
    if decoded.width > limit || decoded.height > limit {
        return Err(TextureError::TooLarge {
            path: path.to_path_buf(),
            width: decoded.width,
            height: decoded.height,
            limit,
        });
    }

    let DecodedTexture {
        width,
        height,
        pixels,
        ..
    } = decoded;
    let texture = create_texture(
        device,
        queue,
        &format!("channel texture #{channel}"),
        (width, height),
        &pixels,
    );
    drop(pixels);

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(ChannelTexture {
        _texture: texture,
        view,
        width,
        height,
    })
}

/// Decode plus upload, the whole load path for one channel.
pub(crate) fn load_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    channel: usize,
    path: &Path,
) -> Result<ChannelTexture, TextureError> {
    let decoded = decode_texture(path)?;
    upload(device, queue, channel, path, decoded)
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    (width, height): (u32, u32),
    data: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    )
}

/// All four channels, the stand-in for unset ones, and their bind group.
pub(crate) struct ChannelSet {
    slots: [Option<ChannelTexture>; CHANNEL_COUNT],
    _placeholder: wgpu::Texture,
    placeholder_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    pub bind_group: wgpu::BindGroup,
}

impl ChannelSet {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        // Sampling an unset channel yields transparent black.
        let placeholder = create_texture(
            device,
            queue,
            "placeholder channel texture",
            (1, 1),
            &[0, 0, 0, 0],
        );
        let placeholder_view = placeholder.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("channel sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let bind_group = build_bind_group(
            device,
            layout,
            &std::array::from_fn(|_| &placeholder_view),
            &sampler,
        );

        Self {
            slots: Default::default(),
            _placeholder: placeholder,
            placeholder_view,
            sampler,
            bind_group,
        }
    }

    pub fn get(&self, channel: usize) -> Option<&ChannelTexture> {
        self.slots.get(channel).and_then(Option::as_ref)
    }

    /// Replaces a channel and returns what was there before.
    ///
    /// The bind group still references the old view until [`Self::rebind`]
    /// runs, so callers drop the returned texture afterwards.
    pub fn replace(
        &mut self,
        channel: usize,
        texture: Option<ChannelTexture>,
    ) -> Option<ChannelTexture> {
        match self.slots.get_mut(channel) {
            Some(slot) => std::mem::replace(slot, texture),
            None => texture,
        }
    }

    pub fn rebind(&mut self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout) {
        let views: [&wgpu::TextureView; CHANNEL_COUNT] = std::array::from_fn(|channel| {
            self.slots[channel]
                .as_ref()
                .map_or(&self.placeholder_view, |texture| &texture.view)
        });
        self.bind_group = build_bind_group(device, layout, &views, &self.sampler);
    }

    /// Pixel size per channel; unset channels report zero.
    pub fn resolutions(&self) -> [[f32; 4]; CHANNEL_COUNT] {
        std::array::from_fn(|channel| {
            self.get(channel)
                .map_or([0.0; 4], ChannelTexture::resolution)
        })
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

fn build_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    views: &[&wgpu::TextureView; CHANNEL_COUNT],
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let mut entries: Vec<wgpu::BindGroupEntry> = views
        .iter()
        .enumerate()
        .map(|(channel, view)| wgpu::BindGroupEntry {
            binding: channel as u32,
            resource: wgpu::BindingResource::TextureView(view),
        })
        .collect();
    entries.push(wgpu::BindGroupEntry {
        binding: SAMPLER_BINDING,
        resource: wgpu::BindingResource::Sampler(sampler),
    });

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("shadeview channels"),
        layout,
        entries: &entries,
    })
}

/// Layout entries for bind group 1: channel `i` at binding `i`, sampler last.
pub(crate) fn layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..CHANNEL_COUNT as u32)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: SAMPLER_BINDING,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, LumaA, Rgb, Rgba};
    use tempfile::tempdir;

    #[test]
    fn rgb_png_decodes_with_file_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        ImageBuffer::from_pixel(7, 3, Rgb([10u8, 20, 30])).save(&path).unwrap();

        let decoded = decode_texture(&path).unwrap();
        assert_eq!((decoded.width, decoded.height), (7, 3));
        assert_eq!(decoded.channels, 3);
        assert_eq!(decoded.pixels.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn rgba_png_keeps_alpha() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        ImageBuffer::from_pixel(2, 2, Rgba([1u8, 2, 3, 4])).save(&path).unwrap();

        let decoded = decode_texture(&path).unwrap();
        assert_eq!(decoded.channels, 4);
        assert_eq!(decoded.pixels.get_pixel(1, 1), &Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn rows_are_flipped_bottom_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stripes.png");
        let image = ImageBuffer::from_fn(1, 2, |_, y| {
            if y == 0 {
                Rgba([255u8, 0, 0, 255])
            } else {
                Rgba([0u8, 0, 255, 255])
            }
        });
        image.save(&path).unwrap();

        let decoded = decode_texture(&path).unwrap();
        assert_eq!(decoded.pixels.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(decoded.pixels.get_pixel(0, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn two_channel_images_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("luma_alpha.png");
        ImageBuffer::from_pixel(4, 4, LumaA([128u8, 255])).save(&path).unwrap();

        match decode_texture(&path) {
            Err(TextureError::UnsupportedChannels { channels, .. }) => assert_eq!(channels, 2),
            other => panic!("expected channel error, got {:?}", other.err()),
        }
    }

    #[test]
    fn grayscale_images_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(4, 4, image::Luma([9u8])).save(&path).unwrap();

        assert!(matches!(
            decode_texture(&path),
            Err(TextureError::UnsupportedChannels { channels: 1, .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let error = decode_texture(&dir.path().join("absent.png")).err().unwrap();
        assert!(matches!(error, TextureError::Read { .. }));
        assert!(error.to_string().contains("absent.png"));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noise.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        assert!(matches!(
            decode_texture(&path),
            Err(TextureError::Decode { .. })
        ));
    }

    #[test]
    fn layout_puts_sampler_after_channels() {
        let entries = layout_entries();
        assert_eq!(entries.len(), CHANNEL_COUNT + 1);
        assert_eq!(entries[CHANNEL_COUNT].binding, SAMPLER_BINDING);
        assert!(matches!(
            entries[CHANNEL_COUNT].ty,
            wgpu::BindingType::Sampler(_)
        ));
    }
}
