//! End-to-end tests against real engines.
//!
//! These tests run the `tesseract` executable and bind pdfium, using sample
//! files in `./test_cases/`. They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! Expected fixtures:
//!   test_cases/digits.png       a line of printed digits on white
//!   test_cases/three_pages.pdf  a 3-page PDF with text on every page

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_ocr::{
    scan_base64, scan_cropped_file, scan_file, BackendRegistry, OutputFormat, Pixel,
    RecognitionOptions, RegionDescriptor, ScanConfig, ScanOutput,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* the fixture at `path` is missing.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn setup() -> (ScanConfig, BackendRegistry) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("edgequake_ocr=debug")
        .with_test_writer()
        .try_init();
    let config = ScanConfig::builder().concurrency(4).build().unwrap();
    let registry = BackendRegistry::from_config(&config);
    (config, registry)
}

fn tesseract(whitelist: &str, trim: bool) -> RecognitionOptions {
    RecognitionOptions::new("tesseract", &["eng"])
        .with_whitelist(whitelist)
        .with_trim(trim)
}

// ── Tesseract ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tesseract_digits_whitelist() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("digits.png"));
    let (config, registry) = setup();

    let bytes = std::fs::read(&path).unwrap();
    let output = scan_file(bytes, tesseract("0123456789", true), &registry, &config)
        .await
        .expect("scan should succeed");

    let ScanOutput::Single(text) = output else {
        panic!("one image must give one string");
    };
    println!("digits.png → {text:?}");
    assert!(!text.is_empty());
    assert_eq!(text, text.trim());
    assert!(text.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()));
}

#[tokio::test]
async fn test_tesseract_hocr() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("digits.png"));
    let (config, registry) = setup();

    let bytes = std::fs::read(&path).unwrap();
    let opts = tesseract("", false).with_format(OutputFormat::Hocr);
    let output = scan_file(bytes, opts, &registry, &config).await.unwrap();

    let texts = output.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("ocr_page"), "hOCR markup expected");
}

#[tokio::test]
async fn test_tesseract_cropped_regions_keep_order() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("digits.png"));
    let (config, registry) = setup();

    let bytes = std::fs::read(&path).unwrap();
    let (w, h) = image::image_dimensions(&path).unwrap();
    let half = w / 2;
    let regions = vec![
        RegionDescriptor::new(Pixel::new(0, 0), Pixel::new(half, h)),
        RegionDescriptor::new(Pixel::new(w, h), Pixel::new(half, 0)),
    ];

    let output = scan_cropped_file(bytes, regions, tesseract("0123456789", true), &registry, &config)
        .await
        .unwrap();
    assert_eq!(output.len(), 2);
    println!("left / right halves → {:?}", output.texts());
}

// ── PDF ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_one_text_per_page() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("three_pages.pdf"));
    let (config, registry) = setup();

    let payload = STANDARD.encode(std::fs::read(&path).unwrap());
    let output = scan_base64(payload, tesseract("", true), &registry, &config)
        .await
        .expect("PDF scan should succeed");

    assert!(matches!(output, ScanOutput::Multiple(_)));
    assert_eq!(output.len(), 3);
    for (i, text) in output.texts().iter().enumerate() {
        println!("page {} → {} chars", i + 1, text.len());
        assert!(!text.is_empty(), "page {} produced no text", i + 1);
    }
}
