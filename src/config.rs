//! Configuration for invoice extraction.
//!
//! Every tunable of the pipeline lives in [`ExtractionConfig`], built via
//! [`ExtractionConfigBuilder`]. The core never reads environment variables;
//! callers decide where values come from.

use crate::error::InvoiceError;
use std::fmt;
use std::path::PathBuf;

/// Rendering scale for PDF pages: 300 DPI over the native 72-DPI space.
pub const PDF_RENDER_SCALE: f32 = 300.0 / 72.0;

const MIN_DIMENSION: u32 = 64;
const MAX_DIMENSION: u32 = 8192;
const MIN_MAX_TOKENS: usize = 256;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use edgequake_invoice::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_dimension(1600)
///     .jpeg_quality(80)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_dimension, 1600);
/// ```
#[derive(Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Largest allowed width or height of a payload image, in pixels.
    /// Range: 64–8192. Default: 2000.
    ///
    /// Bitmaps whose larger side exceeds this are scaled down with Lanczos3;
    /// smaller bitmaps are never upscaled.
    pub max_dimension: u32,

    /// JPEG quality of the payloads. Range: 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Sampling temperature for the model call. Default: 0.1.
    pub temperature: f32,

    /// Output token budget for the model reply. Minimum 256. Default: 2000.
    pub max_tokens: usize,

    /// Timeout for the model call in seconds. `0` disables it. Default: 60.
    pub api_timeout_secs: u64,

    /// Replaces [`crate::prompts::INVOICE_EXTRACTION_PROMPT`] when set.
    pub system_prompt: Option<String>,

    /// Explicit path to the pdfium shared library. When `None` the system
    /// library is bound.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            jpeg_quality: 85,
            temperature: 0.1,
            max_tokens: 2000,
            api_timeout_secs: 60,
            system_prompt: None,
            pdfium_library: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_dimension", &self.max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "system_prompt",
                &self.system_prompt.as_ref().map(|p| format!("<{} chars>", p.len())),
            )
            .field("pdfium_library", &self.pdfium_library)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction sent ahead of the images.
    pub fn prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::INVOICE_EXTRACTION_PROMPT)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.clamp(MIN_DIMENSION, MAX_DIMENSION);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&c.max_dimension) {
            return Err(InvoiceError::InvalidConfig(format!(
                "max_dimension must be {MIN_DIMENSION}–{MAX_DIMENSION}, got {}",
                c.max_dimension
            )));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(InvoiceError::InvalidConfig(format!(
                "jpeg_quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if !c.temperature.is_finite() {
            return Err(InvoiceError::InvalidConfig(
                "temperature must be a finite number".into(),
            ));
        }
        if c.max_tokens < MIN_MAX_TOKENS {
            return Err(InvoiceError::InvalidConfig(format!(
                "max_tokens must be ≥ {MIN_MAX_TOKENS}, got {}",
                c.max_tokens
            )));
        }
        if matches!(&c.system_prompt, Some(p) if p.trim().is_empty()) {
            return Err(InvoiceError::InvalidConfig(
                "system_prompt must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}
