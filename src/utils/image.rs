use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

const TARGET_RATIO: f64 = 4.0 / 5.0;
const RATIO_TOLERANCE: f64 = 0.01;
const JPEG_QUALITY: u8 = 95;

/// Center-crops an image to the 4:5 portrait ratio the storefront expects.
///
/// Deterministic: the longer dimension is trimmed symmetrically. An image
/// already within tolerance of 4:5 is returned byte-for-byte unchanged, so
/// the step is idempotent. Runs before validation, which therefore always
/// sees canonically framed candidates.
pub fn crop_to_4_5(image_bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(image_bytes)?;
    let (width, height) = (img.width(), img.height());
    let current_ratio = width as f64 / height as f64;

    if (current_ratio - TARGET_RATIO).abs() < RATIO_TOLERANCE {
        debug!("image already {}x{} (ratio {:.3}), no crop", width, height, current_ratio);
        return Ok(image_bytes.to_vec());
    }

    let (new_width, new_height) = if current_ratio > TARGET_RATIO {
        ((height as f64 * TARGET_RATIO) as u32, height)
    } else {
        (width, (width as f64 / TARGET_RATIO) as u32)
    };

    let left = (width - new_width) / 2;
    let top = (height - new_height) / 2;
    let cropped = img.crop_imm(left, top, new_width, new_height).to_rgb8();

    debug!(
        "cropped {}x{} -> {}x{} (ratio {:.3})",
        width,
        height,
        new_width,
        new_height,
        new_width as f64 / new_height as f64
    );

    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
    cropped.write_with_encoder(encoder)?;
    Ok(output)
}
