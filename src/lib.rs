//! # edgequake-invoice
//!
//! Read invoices (scans, photos, PDFs) with a Vision Language Model, validate
//! the result against a strict data model, and export it to Excel.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes
//!  │
//!  ├─ 1. Sniff     JPEG / PNG / PDF by magic bytes; text and others rejected
//!  ├─ 2. Render    decrypt and rasterise every PDF page at 300 DPI (pdfium)
//!  ├─ 3. Encode    flatten alpha, cap size, JPEG q85, base64
//!  ├─ 4. VLM       one request: instruction + all page images
//!  ├─ 5. Validate  JSON reply → InvoiceDocument (NIP, dates, ranges, items)
//!  └─ 6. Export    one row per line item → .xlsx
//! ```
//!
//! Model replies and user edits share one validation path: both arrive as an
//! [`InvoiceDraft`] and become an [`InvoiceDocument`] only through
//! `InvoiceDocument::try_from`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_invoice::{process, to_xlsx_bytes, ExtractionConfig, LlmVisionModel, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let model = LlmVisionModel::from_env(None, None)?;
//!     let file = UploadedFile::from_path("faktura.pdf")?;
//!     let doc = process(&file, None, &model, &ExtractionConfig::default()).await?;
//!     std::fs::write("faktura.xlsx", to_xlsx_bytes(&doc)?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Password-protected PDFs
//!
//! [`NormalizeError::PasswordRequired`] and [`NormalizeError::InvalidPassword`]
//! are recoverable: keep the [`UploadedFile`], ask for a password, and call
//! again. The library holds no state between calls.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod validators;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{
    ExportError, ExtractError, FieldError, InvoiceError, NormalizeError, ValidationError,
};
pub use export::{suggested_file_name, to_xlsx_bytes, write_xlsx, ExportTable};
pub use extract::{process, process_sync, process_to_xlsx};
pub use model::{Currency, InvoiceDocument, InvoiceDraft, LineItem, LineItemDraft};
pub use pipeline::input::UploadedFile;
pub use pipeline::llm::{InferenceRequest, ModelReply, VisionModel};
pub use pipeline::{prepare_images, prepare_images_blocking};
pub use provider::{LlmVisionModel, OpenAiCompatibleVision};
