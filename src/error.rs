//! Error types for the edgequake-ocr library.
//!
//! Every pipeline component reports a typed [`ScanError`]; none of them
//! decides what a caller sees. The orchestrator in [`crate::scan`] and the
//! envelope in [`crate::output::ScanResponse`] are the only places where an
//! error becomes a user-visible status and message.
//!
//! Errors fall into two classes ([`ErrorClass`]):
//!
//! * **InputRejected**: the request itself is unusable (bad file type,
//!   malformed base64, broken region list). Raised before any backend work.
//! * **ProcessingFailed**: the request was well-formed but a decode,
//!   rasterisation or OCR call failed. The whole request is aborted; there is
//!   no partial result.
//!
//! Nothing here is retried. Given the same input every failure repeats.

use crate::backend::BackendError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocr library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// Payload is neither a supported image nor a PDF.
    #[error(
        "Invalid file or unsupported file type ({detail}). \
         Only .jpg .jpeg .png .gif .tiff and .pdf are supported"
    )]
    InvalidType { detail: String },

    /// A data-URL declared one MIME type but the bytes are something else.
    #[error("Declared content type '{declared}' does not match detected '{detected}'")]
    MimeMismatch { declared: String, detected: String },

    /// A PDF was submitted to a variant that only accepts images.
    #[error("PDF input is not accepted by {variant}; submit an image")]
    PdfNotAllowed { variant: &'static str },

    /// The base64 payload is malformed.
    #[error("Invalid base64 payload: {reason}")]
    InvalidBase64 { reason: String },

    /// The region list is missing, empty or not the expected JSON shape.
    #[error("Malformed region list: {reason}")]
    MalformedRegions { reason: String },

    /// One region of the batch is degenerate or outside the image.
    #[error("Region #{index} is invalid: {reason}")]
    InvalidRegion { index: usize, reason: String },

    /// A recognition option could not be parsed.
    #[error("Invalid option '{field}': {reason}")]
    InvalidOption { field: &'static str, reason: String },

    /// The requested backend selector is not registered.
    #[error("Unknown OCR backend '{name}' (available: {available})")]
    UnknownBackend { name: String, available: String },

    /// The backend exists but cannot produce the requested output.
    #[error("OCR backend '{backend}' does not support {capability}")]
    UnsupportedCapability {
        backend: String,
        capability: &'static str,
    },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// Bytes passed the type sniffer but could not be decoded.
    #[error("Failed to decode {format} image: {detail}")]
    DecodeFailed { format: String, detail: String },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// PDF is encrypted and no (or a wrong) password was configured.
    #[error("PDF is encrypted and cannot be opened with the configured password")]
    EncryptedPdf,

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
         Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR backend failed on one unit; the whole batch is aborted.
    #[error("OCR failed on unit {ordinal} ({backend}): {source}")]
    OcrBackend {
        ordinal: usize,
        backend: String,
        #[source]
        source: BackendError,
    },

    /// A single OCR call exceeded the per-call timeout.
    #[error("OCR call for unit {ordinal} timed out after {secs}s")]
    OcrTimeout { ordinal: usize, secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which side of the request a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// Client error: nothing was sent to a backend.
    InputRejected,
    /// Server error: work started and was aborted.
    ProcessingFailed,
}

impl ErrorClass {
    /// HTTP-style status hint for transports that need one.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorClass::InputRejected => 400,
            ErrorClass::ProcessingFailed => 500,
        }
    }
}

impl ScanError {
    /// Classify the failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            ScanError::FileNotFound { .. }
            | ScanError::PermissionDenied { .. }
            | ScanError::InvalidType { .. }
            | ScanError::MimeMismatch { .. }
            | ScanError::PdfNotAllowed { .. }
            | ScanError::InvalidBase64 { .. }
            | ScanError::MalformedRegions { .. }
            | ScanError::InvalidRegion { .. }
            | ScanError::InvalidOption { .. }
            | ScanError::UnknownBackend { .. }
            | ScanError::UnsupportedCapability { .. } => ErrorClass::InputRejected,
            _ => ErrorClass::ProcessingFailed,
        }
    }

    /// Fixed machine-readable status code.
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::FileNotFound { .. } => "FILE_NOT_FOUND",
            ScanError::PermissionDenied { .. } => "PERMISSION_DENIED",
            ScanError::InvalidType { .. }
            | ScanError::MimeMismatch { .. }
            | ScanError::PdfNotAllowed { .. } => "INVALID_TYPE",
            ScanError::InvalidBase64 { .. } => "INVALID_BASE64",
            ScanError::MalformedRegions { .. } | ScanError::InvalidRegion { .. } => {
                "INVALID_REGION"
            }
            ScanError::InvalidOption { .. }
            | ScanError::UnknownBackend { .. }
            | ScanError::UnsupportedCapability { .. } => "INVALID_OPTIONS",
            ScanError::DecodeFailed { .. } => "DECODE_ERROR",
            ScanError::CorruptPdf { .. }
            | ScanError::EncryptedPdf
            | ScanError::RasterisationFailed { .. }
            | ScanError::PdfiumBindingFailed(_) => "PDF_DECODE_ERROR",
            ScanError::OcrBackend { .. } | ScanError::OcrTimeout { .. } => "OCR_BACKEND_ERROR",
            ScanError::DownloadFailed { .. }
            | ScanError::DownloadTimeout { .. }
            | ScanError::InvalidConfig(_)
            | ScanError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The terminal state a request reaches when it fails with this error.
    pub fn terminal_state(&self) -> PipelineState {
        match self.class() {
            ErrorClass::InputRejected => PipelineState::Rejected,
            ErrorClass::ProcessingFailed => PipelineState::Failed,
        }
    }
}

/// Per-request orchestration states.
///
/// `Completed`, `Rejected` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    TypeChecked,
    Grayscaled,
    Paginated,
    Cropped,
    Dispatched,
    Aggregated,
    Completed,
    Rejected,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Rejected | PipelineState::Failed
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Received => "RECEIVED",
            PipelineState::TypeChecked => "TYPE_CHECKED",
            PipelineState::Grayscaled => "GRAYSCALED",
            PipelineState::Paginated => "PAGINATED",
            PipelineState::Cropped => "CROPPED",
            PipelineState::Dispatched => "DISPATCHED",
            PipelineState::Aggregated => "AGGREGATED",
            PipelineState::Completed => "COMPLETED",
            PipelineState::Rejected => "REJECTED",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
