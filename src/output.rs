//! Units of work, per-unit results and the response envelope.

use crate::error::{ErrorClass, ScanError};
use crate::pipeline::sniff::ImageKind;
use crate::request::OutputFormat;
use image::GrayImage;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One grayscale raster to be recognised.
///
/// Created by the grayscale transformer, the cropper or the rasteriser and
/// consumed exactly once by the dispatcher.
#[derive(Debug, Clone)]
pub struct ImageUnit {
    /// 0-based position in the request (region index or page index).
    pub ordinal: usize,
    pub pixels: GrayImage,
    /// Format the unit was derived from. Rendered PDF pages report `Png`.
    pub source_format: ImageKind,
}

impl ImageUnit {
    pub fn new(ordinal: usize, pixels: GrayImage, source_format: ImageKind) -> Self {
        Self {
            ordinal,
            pixels,
            source_format,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Recognised text for one unit: plain text or hOCR, per the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub ordinal: usize,
    pub text: String,
}

/// Aggregated output of a completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanOutput {
    /// Exactly one unit: the bare text.
    Single(String),
    /// Several units, in ordinal order.
    Multiple(Vec<String>),
}

impl ScanOutput {
    /// Build the output from results already sorted by ordinal.
    pub fn from_results(results: Vec<RecognitionResult>) -> Self {
        let mut texts: Vec<String> = results.into_iter().map(|r| r.text).collect();
        if texts.len() == 1 {
            ScanOutput::Single(texts.remove(0))
        } else {
            ScanOutput::Multiple(texts)
        }
    }

    /// Texts in order, regardless of shape.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            ScanOutput::Single(t) => vec![t.as_str()],
            ScanOutput::Multiple(ts) => ts.iter().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScanOutput::Single(_) => 1,
            ScanOutput::Multiple(ts) => ts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The envelope handed to a transport.
///
/// Serialises as `{"status":"OK","data":..}` or
/// `{"status":"<CODE>","class":..,"message":..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResponse {
    Ok {
        data: ScanOutput,
    },
    Failed {
        status: String,
        class: ErrorClass,
        message: String,
    },
}

impl Serialize for ScanResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScanResponse::Ok { data } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("status", "OK")?;
                map.serialize_entry("data", data)?;
                map.end()
            }
            ScanResponse::Failed {
                status,
                class,
                message,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("status", status)?;
                map.serialize_entry("class", class)?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}

impl ScanResponse {
    /// Map a scan result to the user-visible envelope.
    pub fn from_result(result: Result<ScanOutput, ScanError>) -> Self {
        match result {
            Ok(data) => ScanResponse::Ok { data },
            Err(e) => ScanResponse::Failed {
                status: e.code().to_string(),
                class: e.class(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ScanResponse::Ok { .. })
    }

    /// Serialise for the wire.
    ///
    /// hOCR successes are returned raw, since the markup is itself the
    /// document; multiple hOCR documents are separated by a newline.
    /// Everything else is the JSON envelope.
    pub fn render(&self, format: OutputFormat) -> String {
        match (self, format) {
            (ScanResponse::Ok { data }, OutputFormat::Hocr) => data.texts().join("\n"),
            _ => serde_json::to_string(self).unwrap_or_else(|e| {
                format!(r#"{{"status":"INTERNAL_ERROR","message":"serialisation failed: {e}"}}"#)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ordinal: usize, text: &str) -> RecognitionResult {
        RecognitionResult {
            ordinal,
            text: text.to_string(),
        }
    }

    #[test]
    fn single_unit_is_bare_string() {
        let out = ScanOutput::from_results(vec![result(0, "hello")]);
        assert_eq!(out, ScanOutput::Single("hello".into()));
        assert_eq!(serde_json::to_string(&out).unwrap(), r#""hello""#);
    }

    #[test]
    fn many_units_are_an_array() {
        let out = ScanOutput::from_results(vec![result(0, "a"), result(1, "b"), result(2, "c")]);
        assert_eq!(out.len(), 3);
        assert_eq!(serde_json::to_string(&out).unwrap(), r#"["a","b","c"]"#);
    }

    #[test]
    fn ok_envelope_shape() {
        let resp = ScanResponse::from_result(Ok(ScanOutput::Single("42".into())));
        let json: serde_json::Value =
            serde_json::from_str(&resp.render(OutputFormat::Plain)).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["data"], "42");
    }

    #[test]
    fn failed_envelope_shape() {
        let resp = ScanResponse::from_result(Err(ScanError::InvalidBase64 {
            reason: "bad padding".into(),
        }));
        assert!(!resp.is_ok());
        let json: serde_json::Value =
            serde_json::from_str(&resp.render(OutputFormat::Hocr)).unwrap();
        assert_eq!(json["status"], "INVALID_BASE64");
        assert_eq!(json["class"], "InputRejected");
        assert!(json["message"].as_str().unwrap().contains("bad padding"));
    }

    #[test]
    fn hocr_success_is_raw() {
        let resp = ScanResponse::from_result(Ok(ScanOutput::Multiple(vec![
            "<div class='ocr_page'>1</div>".into(),
            "<div class='ocr_page'>2</div>".into(),
        ])));
        assert_eq!(
            resp.render(OutputFormat::Hocr),
            "<div class='ocr_page'>1</div>\n<div class='ocr_page'>2</div>"
        );
    }
}
