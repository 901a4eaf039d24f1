//! End-to-end entry points.
//!
//! Bytes → payloads → model → validated [`InvoiceDocument`], optionally
//! followed by the spreadsheet export. Each call is independent; on a
//! recoverable password error the caller keeps its [`UploadedFile`] and calls
//! again with a password.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::export;
use crate::model::InvoiceDocument;
use crate::pipeline::{self, input::UploadedFile, llm};
use crate::pipeline::llm::VisionModel;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Extract one invoice from an uploaded document.
///
/// # Example
/// ```rust,no_run
/// use edgequake_invoice::{process, ExtractionConfig, OpenAiCompatibleVision, UploadedFile};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let file = UploadedFile::from_path("invoice.pdf")?;
///     let model = OpenAiCompatibleVision::xai(std::env::var("XAI_API_KEY")?);
///     let doc = process(&file, None, &model, &ExtractionConfig::default()).await?;
///     println!("{} from {}", doc.invoice_number(), doc.seller_name());
///     Ok(())
/// }
/// ```
pub async fn process(
    file: &UploadedFile,
    password: Option<&str>,
    model: &dyn VisionModel,
    config: &ExtractionConfig,
) -> Result<InvoiceDocument, InvoiceError> {
    let start = Instant::now();
    let payloads = pipeline::prepare_images(file, password, config).await?;
    let document = llm::extract_invoice(model, payloads, config).await?;
    info!("Invoice processed in {:?}", start.elapsed());
    Ok(document)
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    file: &UploadedFile,
    password: Option<&str>,
    model: &dyn VisionModel,
    config: &ExtractionConfig,
) -> Result<InvoiceDocument, InvoiceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(file, password, model, config))
}

/// [`process`], then write the workbook to `output_path`.
pub async fn process_to_xlsx(
    file: &UploadedFile,
    password: Option<&str>,
    model: &dyn VisionModel,
    config: &ExtractionConfig,
    output_path: impl AsRef<Path>,
) -> Result<InvoiceDocument, InvoiceError> {
    let document = process(file, password, model, config).await?;
    export::write_xlsx(&document, output_path).await?;
    Ok(document)
}
