use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};

use crate::error::Result;

/// Rekognition's limit for images passed as raw bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_DIMENSION: u32 = 1920;
const JPEG_QUALITY: u8 = 90;

/// Turns arbitrary image bytes into something the recognition service accepts.
///
/// JPEG and PNG under the byte limit are returned untouched. Everything else
/// is decoded, shrunk to fit [`MAX_DIMENSION`] and re-encoded as JPEG.
pub fn normalize(bytes: &[u8]) -> Result<Vec<u8>> {
    let format = image::guess_format(bytes)?;
    if matches!(format, ImageFormat::Jpeg | ImageFormat::Png) && bytes.len() <= MAX_IMAGE_BYTES {
        return Ok(bytes.to_vec());
    }

    let img = image::load_from_memory(bytes)?;
    let img = fit_within(img, MAX_DIMENSION);

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), JPEG_QUALITY);
    img.to_rgb8().write_with_encoder(encoder)?;
    tracing::debug!(?format, before = bytes.len(), after = buffer.len(), "probe image re-encoded");
    Ok(buffer)
}

fn fit_within(img: DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_size && height <= max_size {
        return img;
    }

    // Keep the aspect ratio; the long side becomes max_size.
    let ratio = width as f32 / height as f32;
    let (new_width, new_height) = if width > height {
        (max_size, ((max_size as f32 / ratio) as u32).max(1))
    } else {
        (((max_size as f32 * ratio) as u32).max(1), max_size)
    };

    img.resize(new_width, new_height, FilterType::Lanczos3)
}
