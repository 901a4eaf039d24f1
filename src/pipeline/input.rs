//! Uploaded bytes and content-based format detection.
//!
//! The file name of an upload is never consulted: browsers and mail clients
//! routinely mislabel scans, so the format is decided by magic bytes only.

use crate::error::NormalizeError;
use image::ImageFormat;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Number of leading bytes inspected by [`sniff_format`].
pub const HEADER_LEN: usize = 16;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const PDF_MAGIC: &[u8] = b"%PDF";

/// An uploaded document held in memory.
///
/// Cloning is cheap (the buffer is shared), and every call to
/// [`UploadedFile::reader`] starts again at byte zero, so a caller can keep
/// one value across a password prompt and hand it back unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    bytes: Arc<[u8]>,
    name: Option<String>,
}

impl UploadedFile {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: Arc::from(bytes),
            name: None,
        }
    }

    /// Attach a display name. It is used in log lines only.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a whole file from disk, keeping its file name for logs.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file = Self::new(bytes);
        Ok(match path.file_name() {
            Some(n) => file.with_name(n.to_string_lossy()),
            None => file,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// A fresh reader positioned at the start of the buffer.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.bytes())
    }

    /// Up to the first [`HEADER_LEN`] bytes.
    pub fn header(&self) -> &[u8] {
        &self.bytes[..self.bytes.len().min(HEADER_LEN)]
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl From<Vec<u8>> for UploadedFile {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for UploadedFile {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

/// What the leading bytes of an upload look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Jpeg,
    Png,
    Pdf,
    /// Decodes as UTF-8 text.
    Text,
    /// Some other image format the `image` crate recognises.
    Other(ImageFormat),
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Jpeg => f.write_str("JPEG"),
            DocumentFormat::Png => f.write_str("PNG"),
            DocumentFormat::Pdf => f.write_str("PDF"),
            DocumentFormat::Text => f.write_str("plain text"),
            DocumentFormat::Other(fmt) => write!(f, "{fmt:?}"),
        }
    }
}

/// Classify `bytes` by its first [`HEADER_LEN`] bytes.
///
/// Order: JPEG, PNG and PDF magic; then UTF-8 text; then the `image` crate's
/// own signature table. Anything left over is corrupt.
///
/// A multi-byte character cut in half by the header window still counts as
/// text.
pub fn sniff_format(bytes: &[u8]) -> Result<DocumentFormat, NormalizeError> {
    if bytes.is_empty() {
        return Err(NormalizeError::corrupted_msg("Empty file"));
    }
    let header = &bytes[..bytes.len().min(HEADER_LEN)];

    let format = if header.starts_with(JPEG_MAGIC) {
        DocumentFormat::Jpeg
    } else if header.starts_with(PNG_MAGIC) {
        DocumentFormat::Png
    } else if header.starts_with(PDF_MAGIC) {
        DocumentFormat::Pdf
    } else if looks_like_text(header) {
        DocumentFormat::Text
    } else {
        match image::guess_format(header) {
            Ok(fmt) => DocumentFormat::Other(fmt),
            Err(_) => {
                return Err(NormalizeError::corrupted_msg(
                    "File appears to be corrupted or is not a valid image format",
                ))
            }
        }
    };

    debug!("Sniffed format: {}", format);
    Ok(format)
}

fn looks_like_text(header: &[u8]) -> bool {
    match std::str::from_utf8(header) {
        Ok(_) => true,
        // `error_len() == None` means the input ended mid-sequence.
        Err(e) => e.error_len().is_none(),
    }
}
