use crate::scene::EnvironmentMap;

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// Full-precision HDR. Not filterable without an extra feature, so it is
    /// sampled with a non-filtering sampler.
    pub const ENVIRONMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    pub fn create_depth_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload an equirectangular environment map, shrinking it first if it
    /// exceeds the device texture limit.
    pub fn from_environment(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        map: &EnvironmentMap,
    ) -> Self {
        let max_side = device.limits().max_texture_dimension_2d;
        match downsample(map, max_side) {
            Some((width, height, pixels)) => {
                log::warn!(
                    "Environment {} is {}x{}, uploading at {}x{}",
                    map.name,
                    map.width,
                    map.height,
                    width,
                    height
                );
                Self::from_rgba32f(device, queue, width, height, &pixels, &map.name)
            }
            None => {
                Self::from_rgba32f(device, queue, map.width, map.height, &map.pixels, &map.name)
            }
        }
    }

    /// One-texel stand-in bound while no environment is installed
    pub fn placeholder_environment(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_rgba32f(device, queue, 1, 1, &[0.0, 0.0, 0.0, 1.0], "placeholder environment")
    }

    fn from_rgba32f(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        pixels: &[f32],
        label: &str,
    ) -> Self {
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
            format: Self::ENVIRONMENT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            bytemuck::cast_slice(pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(16 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Nearest-neighbour shrink so neither side exceeds `max_side`.
/// Returns `None` when the map already fits.
pub fn downsample(map: &EnvironmentMap, max_side: u32) -> Option<(u32, u32, Vec<f32>)> {
    let step = map.width.max(map.height).div_ceil(max_side.max(1));
    if step <= 1 {
        return None;
    }
    let width = (map.width / step).max(1);
    let height = (map.height / step).max(1);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let src = (((y * step) * map.width + x * step) * 4) as usize;
            pixels.extend_from_slice(&map.pixels[src..src + 4]);
        }
    }
    Some((width, height, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_maps_are_uploaded_as_is() {
        let map = EnvironmentMap::new("small", 4, 2, vec![0.0; 4 * 2 * 4]);
        assert!(downsample(&map, 2048).is_none());
    }

    #[test]
    fn large_maps_are_shrunk_to_the_limit() {
        let pixels = (0..8 * 4).flat_map(|i| [i as f32, 0.0, 0.0, 1.0]).collect();
        let map = EnvironmentMap::new("wide", 8, 4, pixels);
        let (width, height, pixels) = downsample(&map, 4).unwrap();
        assert_eq!((width, height), (4, 2));
        assert_eq!(pixels.len(), 4 * 2 * 4);
        // second row starts at source row 2, column 0
        assert_eq!(pixels[4 * 4], 16.0);
    }
}
