//! Tesseract backend: runs the `tesseract` executable once per unit.
//!
//! The unit is written to a temporary PNG (on the blocking pool, so large
//! pages do not stall sibling units) and tesseract prints its result on
//! stdout (`tesseract <png> stdout -l eng+deu [-c tessedit_char_whitelist=..] [hocr]`).
//! The child is spawned with `kill_on_drop`, so a cancelled dispatch (a
//! sibling unit failed, or the call timed out) also kills the process.

use super::{BackendCapabilities, BackendError, OcrBackend};
use crate::pipeline::encode::encode_png;
use crate::request::{OutputFormat, RecognitionOptions};
use async_trait::async_trait;
use image::GrayImage;
use std::io::Write;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

pub struct TesseractBackend {
    command: String,
}

impl TesseractBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Arguments after the input path.
    fn arguments(options: &RecognitionOptions) -> Vec<String> {
        let mut args = vec![
            "stdout".to_string(),
            "-l".to_string(),
            options.language_spec(),
        ];
        if !options.whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", options.whitelist));
        }
        if options.output_format == OutputFormat::Hocr {
            args.push("hocr".to_string());
        }
        args
    }
}

/// PNG-encode the unit into a temporary file that lives as long as the handle.
fn write_unit(image: &GrayImage) -> Result<NamedTempFile, BackendError> {
    let png = encode_png(image)?;
    let mut file = tempfile::Builder::new()
        .prefix("ocr-unit-")
        .suffix(".png")
        .tempfile()?;
    file.write_all(&png)?;
    file.flush()?;
    Ok(file)
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            hocr: true,
            whitelist: true,
            clean_text: true,
        }
    }

    async fn recognize(
        &self,
        image: &GrayImage,
        options: &RecognitionOptions,
    ) -> Result<String, BackendError> {
        let image = image.clone();
        let input = tokio::task::spawn_blocking(move || write_unit(&image))
            .await
            .map_err(|e| BackendError::Engine(format!("encode task panicked: {e}")))??;

        let args = Self::arguments(options);
        debug!("Running {} {} {}", self.command, input.path().display(), args.join(" "));

        let output = Command::new(&self.command)
            .arg(input.path())
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BackendError::Unavailable(format!("'{}' not found on PATH", self.command))
                } else {
                    BackendError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Failed loading language") {
                return Err(BackendError::UnsupportedLanguage(options.language_spec()));
            }
            return Err(BackendError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| BackendError::Engine(format!("tesseract output is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_carry_languages_and_whitelist() {
        let opts = RecognitionOptions::new("tesseract", &["eng", "deu"]).with_whitelist("0123456789");
        assert_eq!(
            TesseractBackend::arguments(&opts),
            vec![
                "stdout",
                "-l",
                "eng+deu",
                "-c",
                "tessedit_char_whitelist=0123456789"
            ]
        );
    }

    #[test]
    fn hocr_config_comes_last() {
        let opts = RecognitionOptions::new("tesseract", &["eng"]).with_format(OutputFormat::Hocr);
        let args = TesseractBackend::arguments(&opts);
        assert_eq!(args.last().map(String::as_str), Some("hocr"));
        assert!(!args.iter().any(|a| a.starts_with("tessedit_char_whitelist")));
    }

    #[test]
    fn unit_file_is_a_png() {
        let img = GrayImage::from_pixel(6, 3, image::Luma([0]));
        let file = write_unit(&img).unwrap();
        let back = image::open(file.path()).unwrap();
        assert_eq!((back.width(), back.height()), (6, 3));
    }

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let backend = TesseractBackend::new("definitely-not-a-tesseract-binary");
        let img = GrayImage::from_pixel(4, 4, image::Luma([255]));
        let opts = RecognitionOptions::new("tesseract", &["eng"]);
        assert!(matches!(
            backend.recognize(&img, &opts).await,
            Err(BackendError::Unavailable(_))
        ));
    }
}
