//! Error types for the edgequake-invoice library.
//!
//! Each pipeline stage owns one error enum so a caller can match exactly the
//! failures it knows how to handle:
//!
//! * [`NormalizeError`]: the uploaded bytes could not be turned into image
//!   payloads. [`NormalizeError::PasswordRequired`] and
//!   [`NormalizeError::InvalidPassword`] are *recoverable*: prompt the user
//!   and call again with the same bytes.
//!
//! * [`FieldError`]: a document failed validation. It names the offending
//!   field (`items[2].vat_rate`) and carries the [`ValidationError`] reason.
//!   The same type comes back from model replies and from user edits.
//!
//! * [`ExtractError`]: the inference round trip failed. Transport failures
//!   (rate limit, timeout, auth) are kept apart so the caller can choose its
//!   own backoff; the library never retries.
//!
//! * [`ExportError`]: the spreadsheet could not be produced or written.
//!
//! [`InvoiceError`] wraps all of them for the end-to-end entry points in
//! [`crate::extract`].

use std::path::PathBuf;
use thiserror::Error;

/// Boxed lower-level cause kept for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── Normalisation ─────────────────────────────────────────────────────────

/// Failures while turning an uploaded document into JPEG payloads.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The bytes are a recognisable format this pipeline does not accept
    /// (plain text, GIF, WebP, …). A different file is required.
    #[error("Unsupported file format: {format}\nSupported formats: PDF, JPEG, PNG.")]
    UnsupportedFormat { format: String },

    /// The bytes are empty, truncated, or otherwise undecodable.
    #[error("File is corrupted or cannot be processed: {reason}")]
    CorruptedFile {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The PDF is encrypted and no password was supplied.
    #[error("PDF is encrypted and requires a password.")]
    PasswordRequired,

    /// A password was supplied but the PDF rejected it.
    #[error("Wrong password for the encrypted PDF.")]
    InvalidPassword,

    /// The pdfium library could not be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium or point `pdfium_library` at an existing copy."
    )]
    PdfEngineUnavailable(String),

    /// The blocking normalisation task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NormalizeError {
    /// Wrap a lower-level decoding failure, keeping it as the error source.
    pub fn corrupted<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        NormalizeError::CorruptedFile {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// A corruption failure with no underlying error value.
    pub fn corrupted_msg(reason: impl Into<String>) -> Self {
        NormalizeError::CorruptedFile {
            reason: reason.into(),
            source: None,
        }
    }

    /// `true` when retrying with the same bytes and a (different) password
    /// can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NormalizeError::PasswordRequired | NormalizeError::InvalidPassword
        )
    }
}

// ── Validation ────────────────────────────────────────────────────────────

/// Why a single value was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Tax ID did not reduce to exactly ten ASCII digits.
    #[error("tax ID must contain exactly 10 digits, found {digits}")]
    InvalidTaxId { digits: usize },

    /// None of the accepted date layouts matched, or the date does not exist.
    #[error("cannot parse date '{input}' (accepted: DD.MM.YYYY, DD/MM/YYYY, YYYY-MM-DD)")]
    InvalidDate { input: String },

    /// Document number is empty once whitespace is removed.
    #[error("document number must not be empty")]
    EmptyDocumentNumber,

    /// Required value is absent.
    #[error("value is required")]
    Missing,

    /// Text is empty or whitespace only.
    #[error("must not be blank")]
    Blank,

    /// Number outside its allowed range.
    #[error("{value} is out of range (expected {rule})")]
    OutOfRange { value: f64, rule: &'static str },

    /// Integer field received a fractional number.
    #[error("{value} is not a whole number")]
    NotWholeNumber { value: f64 },

    /// NaN or infinity.
    #[error("must be a finite number")]
    NotFinite,

    /// Document has no line items.
    #[error("at least one line item is required")]
    EmptyItems,

    /// Currency code outside the supported set.
    #[error("currency '{0}' is not supported (expected PLN, EUR or USD)")]
    UnsupportedCurrency(String),

    /// Value has the wrong JSON type.
    #[error("wrong type: {0}")]
    WrongType(String),
}

/// A validation failure tied to the field that caused it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {reason}")]
pub struct FieldError {
    /// Dotted path of the rejected field, e.g. `items[1].quantity`.
    pub field: String,
    #[source]
    pub reason: ValidationError,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: ValidationError) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

// ── Inference ─────────────────────────────────────────────────────────────

/// Failures of the model round trip.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No image payloads were given; nothing was sent.
    #[error("No images to analyse: the payload list is empty")]
    EmptyInput,

    /// The provider could not be constructed (missing API key, unknown name).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// HTTP 429. The caller should back off.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The call did not finish within the configured timeout.
    #[error("Model call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// 401/403 from the provider.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthFailed { provider: String, detail: String },

    /// Any other transport or API failure.
    #[error("LLM API error from provider '{provider}': {detail}")]
    Transport { provider: String, detail: String },

    /// The reply is not JSON. `reply` is the raw text, unmodified.
    #[error("Model reply is not valid JSON: {source}\nReply was:\n{reply}")]
    MalformedResponse {
        reply: String,
        #[source]
        source: serde_json::Error,
    },

    /// The reply is JSON but violates the invoice schema.
    #[error("Model reply violates the invoice schema: {0}")]
    SchemaViolation(#[source] FieldError),
}

// ── Export ────────────────────────────────────────────────────────────────

/// Failures while producing the spreadsheet.
#[derive(Debug, Error)]
pub enum ExportError {
    /// There are no line items to turn into rows.
    #[error("Cannot export a document without line items")]
    EmptyDocument,

    /// The xlsx writer rejected a value or failed to assemble the file.
    #[error("Spreadsheet generation failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Umbrella ──────────────────────────────────────────────────────────────

/// Any failure of the end-to-end pipeline.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Validation(#[from] FieldError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
