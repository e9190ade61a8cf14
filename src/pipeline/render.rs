//! PDF rasterisation: render every page to a grayscale unit.
//!
//! Pages come back in document order, one unit per page, with ordinal equal
//! to the 0-based page index. A page that fails to render fails the whole
//! document; pages are never skipped.
//!
//! The renderer is a [`PageRasterizer`]. [`PdfiumRasterizer`] is used unless
//! [`ScanConfig::rasterizer`] supplies another one. pdfium keeps
//! thread-local state and is CPU-bound, so every renderer runs on the
//! blocking pool via `spawn_blocking`.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::output::ImageUnit;
use crate::pipeline::grayscale::to_grayscale;
use crate::pipeline::sniff::ImageKind;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Rendering parameters taken from [`ScanConfig`].
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Explicit pdfium library, else `PDFIUM_LIB_PATH`.
    pub library: Option<PathBuf>,
    pub password: Option<String>,
    pub dpi: u32,
    pub max_pixels: u32,
}

impl RenderSettings {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            library: config
                .pdfium_library_path
                .clone()
                .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from)),
            password: config.pdf_password.clone(),
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
        }
    }
}

/// Turns a PDF into one raster per page, in document order.
///
/// Called from the blocking pool, so implementations may block.
pub trait PageRasterizer: Send + Sync {
    fn render_pages(
        &self,
        pdf: &[u8],
        settings: &RenderSettings,
    ) -> Result<Vec<DynamicImage>, ScanError>;
}

/// Render every page of an in-memory PDF into grayscale units.
pub async fn rasterize(pdf: Vec<u8>, config: &ScanConfig) -> Result<Vec<ImageUnit>, ScanError> {
    let settings = RenderSettings::from_config(config);
    let rasterizer: Arc<dyn PageRasterizer> = config
        .rasterizer
        .clone()
        .unwrap_or_else(|| Arc::new(PdfiumRasterizer));

    tokio::task::spawn_blocking(move || -> Result<Vec<ImageUnit>, ScanError> {
        let pages = rasterizer.render_pages(&pdf, &settings)?;
        if pages.is_empty() {
            return Err(ScanError::CorruptPdf {
                detail: "document has no pages".into(),
            });
        }
        Ok(pages
            .iter()
            .enumerate()
            .map(|(idx, page)| ImageUnit::new(idx, to_grayscale(page), ImageKind::Png))
            .collect())
    })
    .await
    .map_err(|e| ScanError::Internal(format!("Render task panicked: {}", e)))?
}

/// pdfium-backed renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRasterizer;

/// Bind pdfium: explicit path, then the working directory, then the system.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, ScanError> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ScanError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

impl PageRasterizer for PdfiumRasterizer {
    fn render_pages(
        &self,
        pdf: &[u8],
        settings: &RenderSettings,
    ) -> Result<Vec<DynamicImage>, ScanError> {
        let pdfium = bind_pdfium(settings.library.as_deref())?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, settings.password.as_deref())
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    ScanError::EncryptedPdf
                } else {
                    ScanError::CorruptPdf { detail: err_str }
                }
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(settings.dpi as f32 / 72.0)
            .set_maximum_width(settings.max_pixels as i32)
            .set_maximum_height(settings.max_pixels as i32);

        let mut images = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ScanError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
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
}
