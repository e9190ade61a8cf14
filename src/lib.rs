//! # edgequake-ocr
//!
//! Extract text from images and PDFs with pluggable OCR backends.
//!
//! A scan request carries an image or PDF (raw bytes or base64), optional
//! rectangular regions and recognition options. The pipeline turns it into
//! one or more grayscale units (a whole image, one per region, or one per PDF
//! page), recognises every unit concurrently and returns the texts in unit
//! order. Any failure aborts the request; partial results are never returned.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Sniff      base64 / data URL decode, magic-number type check
//!  ├─ 2. Unitise    grayscale (+ crop per region) or rasterise PDF pages
//!  ├─ 3. Dispatch   bounded concurrent calls to tesseract / vision LLM
//!  ├─ 4. Finish     whitelist filter, trim
//!  └─ 5. Aggregate  ordered by unit: a single string or a list
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr::{scan_file, BackendRegistry, RecognitionOptions, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScanConfig::default();
//!     let registry = BackendRegistry::from_config(&config);
//!     let options = RecognitionOptions::new("tesseract", &["eng"])
//!         .with_whitelist("0123456789")
//!         .with_trim(true);
//!
//!     let bytes = std::fs::read("invoice.png")?;
//!     let output = scan_file(bytes, options, &registry, &config).await?;
//!     for text in output.texts() {
//!         println!("{text}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Requires | hOCR | Native whitelist |
//! |---------|----------|------|------------------|
//! | `tesseract` | `tesseract` on `PATH` | yes | yes |
//! | `vision` | an `edgequake-llm` provider (e.g. `OPENAI_API_KEY`) | no | no (filtered after) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod scan;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendCapabilities, BackendError, BackendRegistry, OcrBackend};
pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{ErrorClass, PipelineState, ScanError};
pub use output::{ImageUnit, RecognitionResult, ScanOutput, ScanResponse};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer, RenderSettings};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use request::{
    parse_regions, OutputFormat, Pixel, RawOptions, RecognitionOptions, RegionDescriptor,
    ScanRequest,
};
pub use scan::{
    scan, scan_base64, scan_cropped_base64, scan_cropped_file, scan_file, scan_sync,
};
