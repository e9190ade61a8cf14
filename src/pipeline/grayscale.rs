//! Decoding and grayscale conversion.
//!
//! Conversion works on a decoded [`DynamicImage`], never on encoded bytes, so
//! the same code serves JPEG/PNG/GIF/TIFF uploads and rendered PDF pages.

use crate::error::ScanError;
use crate::pipeline::sniff::ImageKind;
use image::{DynamicImage, GrayImage};
use tracing::debug;

/// Decode bytes that the sniffer classified as `kind`.
pub fn decode(bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, ScanError> {
    let img = image::load_from_memory_with_format(bytes, kind.image_format()).map_err(|e| {
        ScanError::DecodeFailed {
            format: kind.to_string(),
            detail: e.to_string(),
        }
    })?;
    debug!("Decoded {} → {}x{} px", kind, img.width(), img.height());
    Ok(img)
}

/// Luminance-weighted single-channel copy. Dimensions are unchanged.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}
