//! Bitmap normalisation: `DynamicImage` → base64 JPEG payload.
//!
//! Every bitmap, whether decoded from an upload or rendered from a PDF page,
//! goes through the same three steps: colour mode, size cap, JPEG encode.

use crate::error::NormalizeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use jpeg_encoder::{ColorType, Encoder};
use tracing::debug;

/// Scale `(width, height)` so the larger side equals `max_dimension`.
///
/// Sizes already within the cap come back unchanged. The shorter side is
/// rounded to the nearest pixel and never drops below 1.
///
/// ```rust
/// use edgequake_invoice::pipeline::encode::target_dimensions;
///
/// assert_eq!(target_dimensions(4000, 3000, 2000), (2000, 1500));
/// assert_eq!(target_dimensions(800, 600, 2000), (800, 600));
/// ```
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let larger = width.max(height);
    if larger <= max_dimension || larger == 0 {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        let scaled = (u64::from(side) * u64::from(max_dimension) + u64::from(larger) / 2)
            / u64::from(larger);
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// Composite an image with transparency onto opaque white.
///
/// Each channel becomes `c·α + 255·(1−α)`.
pub fn flatten_alpha(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);

    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let a = u32::from(src[3]);
        for c in 0..3 {
            let v = u32::from(src[c]) * a + 255 * (255 - a);
            dst[c] = ((v + 127) / 255) as u8;
        }
    }
    out
}

/// Reduce any colour mode to 8-bit RGB or 8-bit grayscale.
fn normalize_color(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        return DynamicImage::ImageRgb8(flatten_alpha(&img));
    }
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
        DynamicImage::ImageLuma16(_) => DynamicImage::ImageLuma8(img.to_luma8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, NormalizeError> {
    let (color, data) = match img {
        DynamicImage::ImageLuma8(buf) => (ColorType::Luma, buf.as_raw()),
        DynamicImage::ImageRgb8(buf) => (ColorType::Rgb, buf.as_raw()),
        _ => {
            return Err(NormalizeError::Internal(
                "JPEG input must be 8-bit RGB or grayscale".into(),
            ))
        }
    };
    let too_large = || {
        NormalizeError::corrupted_msg(format!(
            "image {}x{} exceeds the JPEG size limit",
            img.width(),
            img.height()
        ))
    };
    let width = u16::try_from(img.width()).map_err(|_| too_large())?;
    let height = u16::try_from(img.height()).map_err(|_| too_large())?;

    let mut buf = Vec::new();
    let mut encoder = Encoder::new(&mut buf, quality);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(data, width, height, color)
        .map_err(|e| NormalizeError::corrupted("cannot encode JPEG", e))?;
    Ok(buf)
}

/// Turn one bitmap into a base64 JPEG payload.
pub fn normalize_bitmap(
    img: DynamicImage,
    max_dimension: u32,
    quality: u8,
) -> Result<String, NormalizeError> {
    let (src_w, src_h) = (img.width(), img.height());
    if src_w == 0 || src_h == 0 {
        return Err(NormalizeError::corrupted_msg("image has zero size"));
    }

    let img = normalize_color(img);

    let (w, h) = target_dimensions(src_w, src_h, max_dimension);
    let img = if (w, h) != (src_w, src_h) {
        img.resize_exact(w, h, FilterType::Lanczos3)
    } else {
        img
    };

    let jpeg = encode_jpeg(&img, quality)?;
    let b64 = STANDARD.encode(&jpeg);
    debug!(
        "Normalised {}x{} → {}x{} JPEG, {} bytes base64",
        src_w,
        src_h,
        w,
        h,
        b64.len()
    );
    Ok(b64)
}
