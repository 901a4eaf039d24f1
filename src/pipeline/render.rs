//! PDF rasterisation: decrypt and render every page to `DynamicImage` via pdfium.
//!
//! ## Password handling
//!
//! The document is always opened without a password first. Producers often
//! mark files as encrypted with an empty user password; pdfium opens those
//! as-is, and any password the caller supplied is then ignored. Only when
//! that first attempt reports a password error is the caller's password
//! tried:
//!
//! ```text
//! open(None) ──ok──▶ render
//!     │ password error
//!     ├── no password given  ──▶ PasswordRequired
//!     └── open(Some(pw)) ──ok──▶ render
//!             │ password error ──▶ InvalidPassword
//! ```
//!
//! Everything here is blocking; [`crate::pipeline::prepare_images`] runs it
//! inside `spawn_blocking`.

use crate::config::PDF_RENDER_SCALE;
use crate::error::NormalizeError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Bind the pdfium library at `library`, or the system copy when `None`.
///
/// `library` may name the shared object itself or the directory holding it.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, NormalizeError> {
    let bindings = match library {
        Some(dir) if dir.is_dir() => Pdfium::bind_to_library(dir.join(format!(
            "{}pdfium{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        ))),
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| NormalizeError::PdfEngineUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn is_password_error(e: &PdfiumError) -> bool {
    matches!(
        e,
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError)
    )
}

fn load_failure(e: PdfiumError) -> NormalizeError {
    NormalizeError::corrupted_msg(format!("cannot open PDF: {:?}", e))
}

/// Open `bytes` as a PDF, applying the password rules above.
fn open_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, NormalizeError> {
    // An empty string is the same as no password at all.
    let password = password.filter(|p| !p.is_empty());

    match pdfium.load_pdf_from_byte_slice(bytes, None) {
        Ok(document) => {
            if password.is_some() {
                warn!("PDF opened without a password; the supplied password was not needed");
            }
            Ok(document)
        }
        Err(e) if is_password_error(&e) => {
            let Some(pw) = password else {
                info!("PDF is encrypted and no password was supplied");
                return Err(NormalizeError::PasswordRequired);
            };
            pdfium
                .load_pdf_from_byte_slice(bytes, Some(pw))
                .map_err(|e| {
                    if is_password_error(&e) {
                        NormalizeError::InvalidPassword
                    } else {
                        load_failure(e)
                    }
                })
        }
        Err(e) => Err(load_failure(e)),
    }
}

/// Rasterise every page of a PDF at 300 DPI, in page order.
pub fn rasterize_pdf(
    bytes: &[u8],
    password: Option<&str>,
    library: Option<&Path>,
) -> Result<Vec<DynamicImage>, NormalizeError> {
    let pdfium = bind_pdfium(library)?;
    let document = open_document(&pdfium, bytes, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(NormalizeError::corrupted_msg("PDF has no pages"));
    }
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(PDF_RENDER_SCALE);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            NormalizeError::corrupted_msg(format!("cannot render page {}: {:?}", idx + 1, e))
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
