//! Service configuration for the OCR pipeline.
//!
//! [`ScanConfig`] is read-only for the lifetime of a request: per-request
//! choices (languages, whitelist, output format, backend) live in
//! [`crate::request::RecognitionOptions`] instead. Build it with
//! [`ScanConfig::builder()`] and share it across requests.

use crate::error::ScanError;
use crate::pipeline::render::PageRasterizer;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration shared by every scan request.
///
/// # Example
/// ```rust
/// use edgequake_ocr::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .concurrency(8)
///     .ocr_timeout_secs(30)
///     .default_languages(["eng", "deu"])
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Maximum number of OCR calls in flight for one request. Default: 4.
    ///
    /// Units of one request are independent, so they are dispatched
    /// concurrently, but a local tesseract process per unit is CPU-heavy and a
    /// remote backend has rate limits. Raise it on large machines.
    pub concurrency: usize,

    /// Timeout for a single OCR call, in seconds. Default: 60.
    ///
    /// Applied per unit, never per request: page and region counts are
    /// chosen by the caller.
    pub ocr_timeout_secs: u64,

    /// Rendering DPI for PDF pages. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Maximum rendered page dimension in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Explicit pdfium library to bind. Falls back to `PDFIUM_LIB_PATH`,
    /// then the working directory, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// User password for encrypted PDFs.
    pub pdf_password: Option<String>,

    /// PDF page renderer. `None` uses pdfium.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Executable used by the tesseract backend. Default: `tesseract`.
    pub tesseract_command: String,

    /// Backend used when a request does not name one. Default: `tesseract`.
    pub default_backend: String,

    /// Languages used when a request does not name any. Default: `["eng"]`.
    pub default_languages: Vec<String>,

    /// LLM provider name for the vision backend (e.g. "openai", "ollama").
    pub vision_provider_name: Option<String>,

    /// LLM model for the vision backend. Default when unset: `gpt-4.1-nano`.
    pub vision_model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `vision_provider_name`.
    pub vision_provider: Option<Arc<dyn LLMProvider>>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            ocr_timeout_secs: 60,
            dpi: 300,
            max_rendered_pixels: 4000,
            pdfium_library_path: None,
            pdf_password: None,
            rasterizer: None,
            tesseract_command: "tesseract".to_string(),
            default_backend: "tesseract".to_string(),
            default_languages: vec!["eng".to_string()],
            vision_provider_name: None,
            vision_model: None,
            vision_provider: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("concurrency", &self.concurrency)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("pdf_password", &self.pdf_password.as_ref().map(|_| "<redacted>"))
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"),
            )
            .field("tesseract_command", &self.tesseract_command)
            .field("default_backend", &self.default_backend)
            .field("default_languages", &self.default_languages)
            .field("vision_provider_name", &self.vision_provider_name)
            .field("vision_model", &self.vision_model)
            .field(
                "vision_provider",
                &self.vision_provider.as_ref().map(|_| "<dyn LLMProvider>"),
            )
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn tesseract_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_command = cmd.into();
        self
    }

    pub fn default_backend(mut self, name: impl Into<String>) -> Self {
        self.config.default_backend = name.into();
        self
    }

    pub fn default_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.default_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn vision_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.vision_provider_name = Some(name.into());
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn vision_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.vision_provider = Some(provider);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ScanError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(ScanError::InvalidConfig(
                "OCR timeout must be at least 1 second".into(),
            ));
        }
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ScanError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.default_backend.trim().is_empty() {
            return Err(ScanError::InvalidConfig(
                "Default backend must not be empty".into(),
            ));
        }
        if c.default_languages.is_empty() {
            return Err(ScanError::InvalidConfig(
                "At least one default language is required".into(),
            ));
        }
        Ok(self.config)
    }
}
