use crate::error::LoadError;
use crate::scene::EnvironmentMap;
use image::ImageFormat;

/// Decode Radiance HDR bytes into an equirectangular environment map.
pub fn decode_hdr(name: &str, bytes: &[u8]) -> Result<EnvironmentMap, LoadError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Hdr).map_err(|source| {
        LoadError::DecodeEnvironment {
            name: name.to_string(),
            source,
        }
    })?;
    let rgba = image.to_rgba32f();
    let (width, height) = rgba.dimensions();
    log::info!("Decoded environment {} ({}x{})", name, width, height);
    Ok(EnvironmentMap::new(name, width, height, rgba.into_raw()))
}
