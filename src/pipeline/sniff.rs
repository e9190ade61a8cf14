//! Type sniffing: classify raw bytes or a base64 payload as a supported
//! image, a PDF, or invalid.
//!
//! Classification looks only at magic bytes. A declared MIME type (from a
//! `data:` URL) is never trusted on its own; it must agree with what the
//! bytes say.

use crate::error::ScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Supported raster formats. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Tiff,
}

impl ImageKind {
    fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Gif => Some(ImageKind::Gif),
            ImageFormat::Tiff => Some(ImageKind::Tiff),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Gif => ImageFormat::Gif,
            ImageKind::Tiff => ImageFormat::Tiff,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Tiff => "image/tiff",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Png => "PNG",
            ImageKind::Gif => "GIF",
            ImageKind::Tiff => "TIFF",
        };
        f.write_str(name)
    }
}

/// What a payload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Image(ImageKind),
    Pdf,
}

impl PayloadKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            PayloadKind::Image(kind) => kind.mime_type(),
            PayloadKind::Pdf => "application/pdf",
        }
    }

    pub fn is_pdf(self) -> bool {
        matches!(self, PayloadKind::Pdf)
    }
}

/// A base64 payload after decoding and classification.
#[derive(Debug, Clone)]
pub struct DecodedPayload {
    pub bytes: Vec<u8>,
    pub kind: PayloadKind,
}

const PDF_MAGIC: &[u8] = b"%PDF";

/// Classify raw bytes by magic number.
pub fn classify(bytes: &[u8]) -> Result<PayloadKind, ScanError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(PayloadKind::Pdf);
    }

    let format = image::guess_format(bytes).map_err(|_| ScanError::InvalidType {
        detail: describe_magic(bytes),
    })?;

    ImageKind::from_format(format)
        .map(PayloadKind::Image)
        .ok_or_else(|| ScanError::InvalidType {
            detail: format!("{format:?} is not on the allow-list"),
        })
}

/// Classify bytes that must be an image; PDFs are rejected for `variant`.
pub fn classify_image(bytes: &[u8], variant: &'static str) -> Result<ImageKind, ScanError> {
    match classify(bytes)? {
        PayloadKind::Image(kind) => Ok(kind),
        PayloadKind::Pdf => Err(ScanError::PdfNotAllowed { variant }),
    }
}

static RE_DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+)?(?P<params>(?:;[A-Za-z0-9-]+=[^;,]*)*)(?P<b64>;base64)?,(?P<body>.*)$")
        .unwrap()
});

/// Decode and classify a base64 payload, plain or `data:` URL.
///
/// Whitespace inside the payload (line-wrapped base64) is ignored.
pub fn decode_base64(payload: &str) -> Result<DecodedPayload, ScanError> {
    let payload = payload.trim();
    let (declared, body) = if payload.starts_with("data:") {
        let caps = RE_DATA_URL
            .captures(payload)
            .ok_or_else(|| ScanError::InvalidBase64 {
                reason: "malformed data URL".into(),
            })?;
        if caps.name("b64").is_none() {
            return Err(ScanError::InvalidBase64 {
                reason: "data URL is not base64-encoded".into(),
            });
        }
        let mime = caps.name("mime").map(|m| m.as_str().to_ascii_lowercase());
        let body = caps.name("body").map(|m| m.as_str()).unwrap_or("");
        (mime, body)
    } else {
        (None, payload)
    };

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ScanError::InvalidBase64 {
            reason: "payload is empty".into(),
        });
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ScanError::InvalidBase64 {
            reason: e.to_string(),
        })?;

    let kind = classify(&bytes)?;
    if let Some(declared) = declared {
        check_declared_mime(&declared, kind)?;
    }

    debug!(
        "Decoded base64 payload: {} bytes, {}",
        bytes.len(),
        kind.mime_type()
    );
    Ok(DecodedPayload { bytes, kind })
}

fn check_declared_mime(declared: &str, detected: PayloadKind) -> Result<(), ScanError> {
    let normalised = match declared {
        "image/jpg" | "image/pjpeg" => "image/jpeg",
        "image/tif" => "image/tiff",
        "application/x-pdf" => "application/pdf",
        other => other,
    };
    if normalised != detected.mime_type() {
        return Err(ScanError::MimeMismatch {
            declared: declared.to_string(),
            detected: detected.mime_type().to_string(),
        });
    }
    Ok(())
}

fn describe_magic(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "empty payload".to_string();
    }
    let head: Vec<String> = bytes.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("unrecognised header {}", head.join(" "))
}
