//! OCR backends and the registry that selects them.
//!
//! A backend turns one grayscale raster into text. The orchestrator never
//! branches on backend names: it asks the [`BackendRegistry`] for the
//! backend a request selects, and the registry checks that the backend can
//! honour the request (for example hOCR output) before any work starts.
//! Adding an engine means implementing [`OcrBackend`] and registering it.

pub mod tesseract;
pub mod vision;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::request::{OutputFormat, RecognitionOptions};
use async_trait::async_trait;
use image::GrayImage;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub use tesseract::TesseractBackend;
pub use vision::VisionBackend;

/// Failures reported by a backend for a single image.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The engine is not installed or not reachable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The engine has no data for a requested language.
    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    /// The engine ran and failed.
    #[error("engine error: {0}")]
    Engine(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// What a backend can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Can produce hOCR positional markup.
    pub hocr: bool,
    /// Restricts its own alphabet to a character whitelist.
    pub whitelist: bool,
    /// Plain output is bare text: no code fences, no invisible characters.
    pub clean_text: bool,
}

/// A recognise-one-image OCR engine.
///
/// Implementations must be stateless per call and safe to call concurrently
/// for units of the same request and of different requests.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Selector under which the backend is registered.
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Recognise `image`, returning plain text or hOCR per `options`.
    async fn recognize(
        &self,
        image: &GrayImage,
        options: &RecognitionOptions,
    ) -> Result<String, BackendError>;
}

/// Selector → backend map, shared read-only across requests.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn OcrBackend>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry for a configuration.
    ///
    /// `tesseract` is always registered. `vision` is registered when an LLM
    /// provider can be resolved from the config or the environment.
    pub fn from_config(config: &ScanConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TesseractBackend::new(&config.tesseract_command)));

        match vision::resolve_provider(config) {
            Ok(provider) => {
                registry.register(Arc::new(VisionBackend::new(provider)));
            }
            Err(e) => debug!("Vision backend not registered: {}", e),
        }

        info!("OCR backends available: {}", registry.names().join(", "));
        registry
    }

    /// Add or replace a backend under its own name (case-insensitive).
    pub fn register(&mut self, backend: Arc<dyn OcrBackend>) -> Option<Arc<dyn OcrBackend>> {
        self.backends
            .insert(backend.name().to_ascii_lowercase(), backend)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrBackend>> {
        self.backends.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Find the backend a request selects and check it can serve the request.
    pub fn resolve(&self, options: &RecognitionOptions) -> Result<Arc<dyn OcrBackend>, ScanError> {
        let backend = self
            .get(&options.backend)
            .ok_or_else(|| ScanError::UnknownBackend {
                name: options.backend.clone(),
                available: self.names().join(", "),
            })?;

        if options.output_format == OutputFormat::Hocr && !backend.capabilities().hocr {
            return Err(ScanError::UnsupportedCapability {
                backend: backend.name().to_string(),
                capability: "hOCR output",
            });
        }

        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        hocr: bool,
    }

    #[async_trait]
    impl OcrBackend for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                hocr: self.hocr,
                whitelist: false,
                clean_text: true,
            }
        }

        async fn recognize(
            &self,
            _image: &GrayImage,
            _options: &RecognitionOptions,
        ) -> Result<String, BackendError> {
            Ok(self.name.to_string())
        }
    }

    fn registry() -> BackendRegistry {
        BackendRegistry::new()
            .with(Arc::new(Fixed {
                name: "Alpha",
                hocr: true,
            }))
            .with(Arc::new(Fixed {
                name: "beta",
                hocr: false,
            }))
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = registry();
        assert_eq!(reg.names(), vec!["alpha", "beta"]);
        assert!(reg.get("ALPHA").is_some());
        assert!(reg.get("gamma").is_none());
    }

    #[test]
    fn resolve_unknown_lists_available() {
        let opts = RecognitionOptions::new("gamma", &["eng"]);
        match registry().resolve(&opts) {
            Err(ScanError::UnknownBackend { name, available }) => {
                assert_eq!(name, "gamma");
                assert_eq!(available, "alpha, beta");
            }
            other => panic!("expected UnknownBackend, got {:?}", other.map(|b| b.name().to_string())),
        }
    }

    #[test]
    fn resolve_checks_hocr_capability() {
        let reg = registry();
        let hocr = |b: &str| RecognitionOptions::new(b, &["eng"]).with_format(OutputFormat::Hocr);
        assert!(reg.resolve(&hocr("alpha")).is_ok());
        assert!(matches!(
            reg.resolve(&hocr("beta")),
            Err(ScanError::UnsupportedCapability { .. })
        ));
    }

    #[test]
    fn from_config_always_has_tesseract() {
        let config = ScanConfig::default();
        let reg = BackendRegistry::from_config(&config);
        assert!(reg.get("tesseract").is_some());
    }
}
