//! Unit encoding: grayscale raster → PNG bytes, or a base64 `ImageData` for
//! multimodal APIs.
//!
//! PNG is used for every backend regardless of the upload's format: it is
//! lossless, handles single-channel data natively, and every OCR engine reads
//! it. JPEG artefacts around glyph edges measurably hurt recognition.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{GrayImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a unit raster as PNG.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded {}x{} unit → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Encode a unit as a base64 PNG ready for a vision API.
///
/// `detail: "high"` keeps the full tile budget so small print survives.
pub fn encode_image_data(img: &GrayImage) -> Result<ImageData, image::ImageError> {
    let b64 = STANDARD.encode(encode_png(img)?);
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn encode_small_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        let data = encode_image_data(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"));
    }

    #[test]
    fn png_keeps_dimensions() {
        let img = GrayImage::from_pixel(13, 7, Luma([0]));
        let png = encode_png(&img).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (13, 7));
    }
}
