use std::io::Cursor;

use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};

use super::ImageProcessingError;

/// Center-crop `data` to the target aspect ratio, then resize to exactly
/// `width` x `height`. Returns PNG bytes.
///
/// Pure and deterministic: the same input always yields the same bytes.
pub fn crop_and_resize(
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, ImageProcessingError> {
    if width == 0 || height == 0 {
        return Err(ImageProcessingError::InvalidTarget { width, height });
    }

    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageProcessingError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| ImageProcessingError::Decode(e.to_string()))?;

    let (src_w, src_h) = (img.width(), img.height());
    let (x, y, crop_w, crop_h) = crop_window(src_w, src_h, width, height);

    let resized = img
        .crop_imm(x, y, crop_w, crop_h)
        .resize_exact(width, height, FilterType::Lanczos3);

    let mut buf = Cursor::new(Vec::new());
    resized
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ImageProcessingError::Encode(e.to_string()))?;

    Ok(buf.into_inner())
}

/// Largest window with the target aspect ratio, centered in the source.
/// Returns (x, y, width, height).
fn crop_window(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32, u32, u32) {
    // Compare src_w / src_h with target_w / target_h without floats.
    let src_cross = u64::from(src_w) * u64::from(target_h);
    let target_cross = u64::from(src_h) * u64::from(target_w);

    if src_cross > target_cross {
        // Wider than target: trim left and right.
        let crop_w = ((target_cross / u64::from(target_h)) as u32).clamp(1, src_w);
        ((src_w - crop_w) / 2, 0, crop_w, src_h)
    } else if src_cross < target_cross {
        // Taller than target: trim top and bottom.
        let crop_h = ((src_cross / u64::from(target_w)) as u32).clamp(1, src_h);
        (0, (src_h - crop_h) / 2, src_w, crop_h)
    } else {
        (0, 0, src_w, src_h)
    }
}
