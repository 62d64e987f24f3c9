//! PNG/JPEG boundary between encoded bytes and [`Raster`].

use std::io::Cursor;

use image::ImageFormat;

use crate::artwork_extract::raster::Raster;
use crate::utils::validate_non_empty_image;
use crate::ExtractError;

/// Decodes PNG or JPEG bytes into an RGBA raster.
///
/// # Errors
///
/// * `ExtractError::Decode` - If the bytes are not a supported image, or the
///   image has a zero dimension
pub fn decode(bytes: &[u8]) -> Result<Raster, ExtractError> {
    let image = image::load_from_memory(bytes).map_err(|e| ExtractError::Decode(e.to_string()))?;
    validate_non_empty_image(image.width(), image.height(), "decoded image")?;
    Ok(image.to_rgba8())
}

/// Encodes a raster as PNG, preserving the alpha channel.
///
/// # Errors
///
/// * `ExtractError::ExtractionFailure` - If the PNG encoder fails
pub fn encode_png(raster: &Raster) -> Result<Vec<u8>, ExtractError> {
    let mut buffer = Cursor::new(Vec::new());
    raster
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ExtractError::failure("png encoding", e.to_string()))?;
    Ok(buffer.into_inner())
}
