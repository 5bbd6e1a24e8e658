//! Size/format bounds and PNG normalization for attachments.
//!
//! Everything that leaves this module is PNG, at most `MAX_DIMENSION` on
//! each side and at most `MAX_FILE_SIZE` bytes.

use crate::error::FeedbackError;
use crate::feedback::session::ImageAttachment;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;

/// Largest accepted input or output payload: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: u32 = 4096;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

fn invalid(msg: String) -> FeedbackError {
    FeedbackError::InvalidAttachment(msg)
}

/// Load an image file, check bounds, convert to PNG.
pub fn load_from_file(path: &Path) -> Result<ImageAttachment, FeedbackError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| invalid(format!("File not found: {} ({})", path.display(), e)))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(invalid(format!(
            "File too large: {:.1}MB, at most {}MB is supported",
            metadata.len() as f64 / 1024.0 / 1024.0,
            MAX_FILE_SIZE / 1024 / 1024
        )));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid(format!("Unsupported image type: .{}", extension)));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    from_encoded_bytes(&bytes, format!("file: {}", name))
}

/// Decode encoded bytes (any supported format), check bounds, convert to PNG.
/// PNG input is kept byte-for-byte.
pub fn from_encoded_bytes(
    bytes: &[u8],
    source_label: impl Into<String>,
) -> Result<ImageAttachment, FeedbackError> {
    if bytes.is_empty() {
        return Err(invalid("Image data is empty".to_string()));
    }
    if bytes.len() as u64 > MAX_FILE_SIZE {
        return Err(invalid(format!(
            "Image data too large: {} bytes",
            bytes.len()
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| invalid(format!("Unrecognized image data: {}", e)))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| invalid(format!("Failed to decode image: {}", e)))?;

    let (width, height) = check_dimensions(&decoded)?;

    let payload = if format == ImageFormat::Png {
        bytes.to_vec()
    } else {
        log::debug!("[IMAGE] Converting {:?} to PNG", format);
        encode_png(&decoded)?
    };
    Ok(ImageAttachment::new(payload, source_label, width, height))
}

/// Encode raw RGBA8 pixels (clipboard contents) as PNG.
pub fn from_rgba(
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    source_label: impl Into<String>,
) -> Result<ImageAttachment, FeedbackError> {
    let buffer = image::RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        invalid(format!(
            "Pixel buffer does not match {}x{} RGBA dimensions",
            width, height
        ))
    })?;
    let decoded = DynamicImage::ImageRgba8(buffer);
    check_dimensions(&decoded)?;
    let payload = encode_png(&decoded)?;
    Ok(ImageAttachment::new(payload, source_label, width, height))
}

fn check_dimensions(image: &DynamicImage) -> Result<(u32, u32), FeedbackError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(invalid("Image has no pixels".to_string()));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(invalid(format!(
            "Image too large: {}x{}, at most {}x{} is supported",
            width, height, MAX_DIMENSION, MAX_DIMENSION
        )));
    }
    Ok((width, height))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, FeedbackError> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| invalid(format!("PNG encode failed: {}", e)))?;
    if png_bytes.len() as u64 > MAX_FILE_SIZE {
        return Err(invalid(format!(
            "Encoded PNG too large: {} bytes",
            png_bytes.len()
        )));
    }
    Ok(png_bytes)
}
