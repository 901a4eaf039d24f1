//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm
//! (sniff)   (pdfium)   (JPEG/b64) (VLM + validation)
//! ```
//!
//! 1. [`input`]: hold the uploaded bytes and classify them by magic bytes
//! 2. [`render`]: open PDFs (password rules included) and rasterise every
//!    page at 300 DPI; blocking, so it runs in `spawn_blocking`
//! 3. [`encode`]: flatten alpha, cap the size, encode JPEG, base64-wrap
//! 4. [`llm`]: one model call, then JSON parsing and validation
//!
//! [`prepare_images`] runs steps 1–3 and yields the ordered payload list.

pub mod encode;
pub mod input;
pub mod llm;
pub mod render;

use crate::config::ExtractionConfig;
use crate::error::NormalizeError;
use image::{DynamicImage, ImageFormat};
use input::{sniff_format, DocumentFormat, UploadedFile};
use tracing::info;

/// Turn an upload into base64 JPEG payloads, one per image or PDF page.
///
/// Runs on the blocking thread pool. `password` is only consulted for
/// encrypted PDFs; on [`NormalizeError::PasswordRequired`] or
/// [`NormalizeError::InvalidPassword`] call again with the same `file`.
pub async fn prepare_images(
    file: &UploadedFile,
    password: Option<&str>,
    config: &ExtractionConfig,
) -> Result<Vec<String>, NormalizeError> {
    let file = file.clone();
    let password = password.map(str::to_string);
    let config = config.clone();

    tokio::task::spawn_blocking(move || {
        prepare_images_blocking(&file, password.as_deref(), &config)
    })
    .await
    .map_err(|e| NormalizeError::Internal(format!("Normalisation task panicked: {}", e)))?
}

/// Blocking implementation of [`prepare_images`].
pub fn prepare_images_blocking(
    file: &UploadedFile,
    password: Option<&str>,
    config: &ExtractionConfig,
) -> Result<Vec<String>, NormalizeError> {
    let format = sniff_format(file.bytes())?;
    info!(
        "Detected {} ({} bytes){}",
        format,
        file.len(),
        file.name().map(|n| format!(" in {n}")).unwrap_or_default()
    );

    let bitmaps = match format {
        DocumentFormat::Jpeg => vec![decode_image(file.bytes(), ImageFormat::Jpeg)?],
        DocumentFormat::Png => vec![decode_image(file.bytes(), ImageFormat::Png)?],
        DocumentFormat::Pdf => {
            render::rasterize_pdf(file.bytes(), password, config.pdfium_library.as_deref())?
        }
        DocumentFormat::Text | DocumentFormat::Other(_) => {
            return Err(NormalizeError::UnsupportedFormat {
                format: format.to_string(),
            })
        }
    };

    let payloads = bitmaps
        .into_iter()
        .map(|img| encode::normalize_bitmap(img, config.max_dimension, config.jpeg_quality))
        .collect::<Result<Vec<_>, _>>()?;

    info!("Prepared {} image payload(s)", payloads.len());
    Ok(payloads)
}

fn decode_image(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, NormalizeError> {
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| NormalizeError::corrupted(format!("cannot decode {:?} image", format), e))
}
