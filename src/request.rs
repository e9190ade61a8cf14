//! Request types: recognition options, region descriptors and the four
//! request variants.
//!
//! Options arrive as loosely-typed strings (form fields, CLI flags, JSON) in
//! [`RawOptions`] and are parsed exactly once into [`RecognitionOptions`].
//! Region corners arrive as two arbitrary points; [`RegionDescriptor::canonicalize`]
//! turns them into a [`CropBox`], which is the only rectangle type the
//! cropper ever sees.

use crate::config::ScanConfig;
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Recognition options ──────────────────────────────────────────────────

/// Output shape requested from the OCR backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain recognised text. (default)
    #[default]
    Plain,
    /// hOCR positional markup.
    Hocr,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => f.write_str("plain"),
            OutputFormat::Hocr => f.write_str("hocr"),
        }
    }
}

/// Options passed unchanged to every OCR call of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    /// Language codes, first occurrence order, no duplicates.
    pub languages: Vec<String>,
    /// Allowed characters, no duplicates. Empty means unrestricted.
    pub whitelist: String,
    pub output_format: OutputFormat,
    /// Strip leading/trailing whitespace from every result.
    pub trim: bool,
    /// Backend selector, looked up in the [`crate::backend::BackendRegistry`].
    pub backend: String,
}

impl RecognitionOptions {
    /// Options with the given backend and languages, plain output, no whitelist.
    ///
    /// The languages are taken as given; [`crate::scan::scan`] checks them
    /// with [`normalized`](Self::normalized) before any backend work.
    pub fn new(backend: impl Into<String>, languages: &[&str]) -> Self {
        Self {
            languages: languages.iter().map(|l| l.to_string()).collect(),
            whitelist: String::new(),
            output_format: OutputFormat::Plain,
            trim: false,
            backend: backend.into(),
        }
    }

    pub fn with_whitelist(mut self, whitelist: &str) -> Self {
        self.whitelist = dedup_chars(whitelist);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Parse the loosely-typed request fields.
    ///
    /// Empty fields fall back to the configured defaults.
    pub fn from_raw(raw: &RawOptions, config: &ScanConfig) -> Result<Self, ScanError> {
        let mut languages = parse_languages(raw.languages.as_deref().unwrap_or(""))?;
        if languages.is_empty() {
            languages = config.default_languages.clone();
        }

        let backend = match raw.backend.as_deref().map(str::trim) {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => config.default_backend.clone(),
        };

        Ok(Self {
            languages,
            whitelist: dedup_chars(raw.whitelist.as_deref().unwrap_or("")),
            output_format: parse_format(raw.format.as_deref().unwrap_or(""))?,
            trim: parse_bool("trim", raw.trim.as_deref().unwrap_or(""))?,
            backend,
        })
    }

    /// Re-check options assembled by hand rather than through [`from_raw`](Self::from_raw).
    ///
    /// Language entries are split on the usual separators, validated and
    /// deduplicated in first-occurrence order; an empty list falls back to
    /// `config.default_languages`, an empty backend to `config.default_backend`.
    pub fn normalized(mut self, config: &ScanConfig) -> Result<Self, ScanError> {
        let mut languages =
            collect_languages(self.languages.iter().flat_map(|l| split_languages(l)))?;
        if languages.is_empty() {
            languages = collect_languages(config.default_languages.iter().map(String::as_str))?;
        }
        self.languages = languages;
        self.whitelist = dedup_chars(&self.whitelist);
        if self.backend.trim().is_empty() {
            self.backend = config.default_backend.clone();
        }
        Ok(self)
    }

    /// Language list joined the way tesseract expects (`eng+deu`).
    pub fn language_spec(&self) -> String {
        self.languages.join("+")
    }
}

/// Request option fields as received from a transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOptions {
    pub languages: Option<String>,
    pub whitelist: Option<String>,
    #[serde(alias = "outputFormat")]
    pub format: Option<String>,
    pub trim: Option<String>,
    #[serde(alias = "ocrBackend")]
    pub backend: Option<String>,
}

fn split_languages(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c == ',' || c == '+' || c.is_whitespace())
}

fn parse_languages(s: &str) -> Result<Vec<String>, ScanError> {
    collect_languages(split_languages(s))
}

fn collect_languages<'a>(codes: impl IntoIterator<Item = &'a str>) -> Result<Vec<String>, ScanError> {
    let mut out: Vec<String> = Vec::new();
    for code in codes {
        if code.is_empty() {
            continue;
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ScanError::InvalidOption {
                field: "languages",
                reason: format!("'{code}' is not a language code"),
            });
        }
        if !out.iter().any(|c| c == code) {
            out.push(code.to_string());
        }
    }
    Ok(out)
}

fn parse_format(s: &str) -> Result<OutputFormat, ScanError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "plain" | "text" => Ok(OutputFormat::Plain),
        "hocr" => Ok(OutputFormat::Hocr),
        other => Err(ScanError::InvalidOption {
            field: "format",
            reason: format!("expected 'plain' or 'hocr', got '{other}'"),
        }),
    }
}

fn parse_bool(field: &'static str, s: &str) -> Result<bool, ScanError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(ScanError::InvalidOption {
            field,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn dedup_chars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if !out.contains(c) {
            out.push(c);
        }
    }
    out
}

// ── Regions ──────────────────────────────────────────────────────────────

/// A point in image pixel space, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
}

impl Pixel {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Two corners of a rectangle, in any diagonal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    #[serde(rename = "pointA")]
    pub corner_a: Pixel,
    #[serde(rename = "pointB")]
    pub corner_b: Pixel,
}

impl RegionDescriptor {
    pub fn new(corner_a: Pixel, corner_b: Pixel) -> Self {
        Self { corner_a, corner_b }
    }

    /// Normalise to a top-left/bottom-right box. Commutative in the corners.
    pub fn canonicalize(&self) -> CropBox {
        CropBox {
            left: self.corner_a.x.min(self.corner_b.x),
            top: self.corner_a.y.min(self.corner_b.y),
            right: self.corner_a.x.max(self.corner_b.x),
            bottom: self.corner_a.y.max(self.corner_b.y),
        }
    }
}

/// A canonical crop rectangle covering `[left, right) × [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Check the box is non-empty and inside a `width × height` image.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), String> {
        if self.width() == 0 || self.height() == 0 {
            return Err(format!(
                "box {}x{} at ({},{}) has zero area",
                self.width(),
                self.height(),
                self.left,
                self.top
            ));
        }
        if self.right > width || self.bottom > height {
            return Err(format!(
                "box ({},{})-({},{}) exceeds image bounds {}x{}",
                self.left, self.top, self.right, self.bottom, width, height
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawPixel {
    x: i64,
    y: i64,
}

#[derive(Deserialize)]
struct RawRegion {
    #[serde(rename = "pointA")]
    point_a: RawPixel,
    #[serde(rename = "pointB")]
    point_b: RawPixel,
}

/// Parse a JSON region list: `[{"pointA":{"x":..,"y":..},"pointB":{..}}, ..]`.
///
/// An empty list is rejected; a partial region set is never useful.
pub fn parse_regions(json: &str) -> Result<Vec<RegionDescriptor>, ScanError> {
    if json.trim().is_empty() {
        return Err(ScanError::MalformedRegions {
            reason: "region list is empty".into(),
        });
    }

    let raw: Vec<RawRegion> =
        serde_json::from_str(json).map_err(|e| ScanError::MalformedRegions {
            reason: format!("not a valid region JSON array: {e}"),
        })?;

    if raw.is_empty() {
        return Err(ScanError::MalformedRegions {
            reason: "region list is empty".into(),
        });
    }

    raw.into_iter()
        .enumerate()
        .map(|(index, r)| {
            Ok(RegionDescriptor::new(
                to_pixel(index, &r.point_a)?,
                to_pixel(index, &r.point_b)?,
            ))
        })
        .collect()
}

fn to_pixel(index: usize, p: &RawPixel) -> Result<Pixel, ScanError> {
    let coord = |v: i64| {
        u32::try_from(v).map_err(|_| ScanError::InvalidRegion {
            index,
            reason: format!("coordinate {v} is outside the pixel range"),
        })
    };
    Ok(Pixel::new(coord(p.x)?, coord(p.y)?))
}

// ── Request variants ─────────────────────────────────────────────────────

/// One inbound scan request.
#[derive(Debug, Clone)]
pub enum ScanRequest {
    /// Raw file bytes (image or PDF).
    File {
        bytes: Vec<u8>,
        options: RecognitionOptions,
    },
    /// Raw image bytes plus regions. PDFs are rejected.
    CroppedFile {
        bytes: Vec<u8>,
        regions: Vec<RegionDescriptor>,
        options: RecognitionOptions,
    },
    /// Base64 payload (image or PDF), optionally a data-URL.
    Base64 {
        payload: String,
        options: RecognitionOptions,
    },
    /// Base64 image payload plus regions. PDFs are rejected.
    CroppedBase64 {
        payload: String,
        regions: Vec<RegionDescriptor>,
        options: RecognitionOptions,
    },
}

impl ScanRequest {
    pub fn options(&self) -> &RecognitionOptions {
        match self {
            ScanRequest::File { options, .. }
            | ScanRequest::CroppedFile { options, .. }
            | ScanRequest::Base64 { options, .. }
            | ScanRequest::CroppedBase64 { options, .. } => options,
        }
    }

    /// Short variant name used in logs and error messages.
    pub fn variant(&self) -> &'static str {
        match self {
            ScanRequest::File { .. } => "file scan",
            ScanRequest::CroppedFile { .. } => "cropped file scan",
            ScanRequest::Base64 { .. } => "base64 scan",
            ScanRequest::CroppedBase64 { .. } => "cropped base64 scan",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_is_commutative() {
        let a = Pixel::new(983, 249);
        let b = Pixel::new(127, 309);
        let one = RegionDescriptor::new(a, b).canonicalize();
        let two = RegionDescriptor::new(b, a).canonicalize();
        assert_eq!(one, two);
        assert_eq!(
            one,
            CropBox {
                left: 127,
                top: 249,
                right: 983,
                bottom: 309
            }
        );
        assert_eq!((one.width(), one.height()), (856, 60));
    }

    #[test]
    fn canonicalize_anti_diagonal_corners() {
        let r = RegionDescriptor::new(Pixel::new(10, 2), Pixel::new(2, 10));
        assert_eq!(
            r.canonicalize(),
            CropBox {
                left: 2,
                top: 2,
                right: 10,
                bottom: 10
            }
        );
    }

    #[test]
    fn validate_rejects_zero_area_and_overflow() {
        let flat = RegionDescriptor::new(Pixel::new(5, 5), Pixel::new(50, 5)).canonicalize();
        assert!(flat.validate(100, 100).is_err());

        let wide = RegionDescriptor::new(Pixel::new(0, 0), Pixel::new(101, 10)).canonicalize();
        assert!(wide.validate(100, 100).is_err());

        let full = RegionDescriptor::new(Pixel::new(0, 0), Pixel::new(100, 100)).canonicalize();
        assert!(full.validate(100, 100).is_ok());
    }

    #[test]
    fn inverted_box_is_zero_area_not_a_panic() {
        let inverted = CropBox {
            left: 50,
            top: 40,
            right: 10,
            bottom: 5,
        };
        assert_eq!((inverted.width(), inverted.height()), (0, 0));
        assert!(inverted.validate(100, 100).is_err());
    }

    #[test]
    fn parse_regions_reads_point_pairs() {
        let json = r#"[{"pointA":{"x":127,"y":249},"pointB":{"x":983,"y":309}},
                       {"pointA":{"x":5,"y":9},"pointB":{"x":1,"y":2}}]"#;
        let regions = parse_regions(json).expect("valid regions");
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].corner_a, Pixel::new(127, 249));
        assert_eq!(regions[1].corner_b, Pixel::new(1, 2));
    }

    #[test]
    fn parse_regions_rejects_bad_input() {
        assert!(matches!(
            parse_regions(""),
            Err(ScanError::MalformedRegions { .. })
        ));
        assert!(matches!(
            parse_regions("[]"),
            Err(ScanError::MalformedRegions { .. })
        ));
        assert!(matches!(
            parse_regions("{not json"),
            Err(ScanError::MalformedRegions { .. })
        ));
        let negative = r#"[{"pointA":{"x":1,"y":1},"pointB":{"x":2,"y":2}},
                           {"pointA":{"x":-1,"y":0},"pointB":{"x":2,"y":2}}]"#;
        assert!(matches!(
            parse_regions(negative),
            Err(ScanError::InvalidRegion { index: 1, .. })
        ));
    }

    #[test]
    fn options_from_raw_defaults() {
        let config = ScanConfig::default();
        let opts = RecognitionOptions::from_raw(&RawOptions::default(), &config).unwrap();
        assert_eq!(opts.languages, vec!["eng".to_string()]);
        assert_eq!(opts.backend, "tesseract");
        assert_eq!(opts.output_format, OutputFormat::Plain);
        assert!(!opts.trim);
        assert!(opts.whitelist.is_empty());
    }

    #[test]
    fn options_from_raw_parses_fields() {
        let raw = RawOptions {
            languages: Some("chi_sim, eng+eng deu".into()),
            whitelist: Some("0123456789 0".into()),
            format: Some("HOCR".into()),
            trim: Some("true".into()),
            backend: Some("vision".into()),
        };
        let opts = RecognitionOptions::from_raw(&raw, &ScanConfig::default()).unwrap();
        assert_eq!(opts.languages, vec!["chi_sim", "eng", "deu"]);
        assert_eq!(opts.language_spec(), "chi_sim+eng+deu");
        assert_eq!(opts.whitelist, "0123456789 ");
        assert_eq!(opts.output_format, OutputFormat::Hocr);
        assert!(opts.trim);
        assert_eq!(opts.backend, "vision");
    }

    #[test]
    fn options_from_raw_rejects_garbage() {
        let config = ScanConfig::default();
        let bad_format = RawOptions {
            format: Some("pdf".into()),
            ..Default::default()
        };
        assert!(RecognitionOptions::from_raw(&bad_format, &config).is_err());

        let bad_trim = RawOptions {
            trim: Some("maybe".into()),
            ..Default::default()
        };
        assert!(RecognitionOptions::from_raw(&bad_trim, &config).is_err());

        let bad_lang = RawOptions {
            languages: Some("eng;rm -rf".into()),
            ..Default::default()
        };
        assert!(matches!(
            RecognitionOptions::from_raw(&bad_lang, &config),
            Err(ScanError::InvalidOption {
                field: "languages",
                ..
            })
        ));
    }

    #[test]
    fn normalized_dedups_and_falls_back() {
        let config = ScanConfig::default();

        let empty = RecognitionOptions::new("tesseract", &[]).normalized(&config).unwrap();
        assert_eq!(empty.languages, vec!["eng"]);

        let dup = RecognitionOptions::new("tesseract", &["eng", "deu+eng", "", "deu"])
            .normalized(&config)
            .unwrap();
        assert_eq!(dup.languages, vec!["eng", "deu"]);

        let unnamed = RecognitionOptions::new("  ", &["eng"]).normalized(&config).unwrap();
        assert_eq!(unnamed.backend, "tesseract");
    }

    #[test]
    fn normalized_rejects_shell_characters() {
        let opts = RecognitionOptions::new("tesseract", &["eng", "eng", "a;b"]);
        assert!(matches!(
            opts.normalized(&ScanConfig::default()),
            Err(ScanError::InvalidOption {
                field: "languages",
                ..
            })
        ));
    }

    #[test]
    fn raw_options_accept_camel_case_aliases() {
        let raw: RawOptions =
            serde_json::from_str(r#"{"outputFormat":"hocr","ocrBackend":"vision"}"#).unwrap();
        assert_eq!(raw.format.as_deref(), Some("hocr"));
        assert_eq!(raw.backend.as_deref(), Some("vision"));
    }
}
