//! Concurrent OCR dispatch over a batch of units.
//!
//! Units are recognised with at most `config.concurrency` calls in flight.
//! Completion order is arbitrary; results are re-sorted by ordinal, so the
//! output position of a unit never depends on timing.
//!
//! The first failure (backend error or per-call timeout) ends the batch:
//! `try_collect` returns early and drops the stream, which drops every
//! in-flight recognition future. Backends that own external work tie it to
//! the future (tesseract children are spawned with `kill_on_drop`), so
//! nothing keeps running after the request has failed.

use crate::backend::OcrBackend;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::output::{ImageUnit, RecognitionResult};
use crate::pipeline::postprocess::finish_text;
use crate::progress::ProgressCallback;
use crate::request::RecognitionOptions;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Recognise every unit and return the results in ordinal order.
pub async fn dispatch_units(
    units: Vec<ImageUnit>,
    backend: Arc<dyn OcrBackend>,
    options: &RecognitionOptions,
    config: &ScanConfig,
) -> Result<Vec<RecognitionResult>, ScanError> {
    let total = units.len();
    if total == 0 {
        return Err(ScanError::Internal("no units to dispatch".into()));
    }

    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_scan_start(total);
    }

    let concurrency = config.concurrency.clamp(1, total);
    debug!(
        "Dispatching {} unit(s) to '{}' with concurrency {}",
        total,
        backend.name(),
        concurrency
    );

    let completed = AtomicUsize::new(0);
    let outcome: Result<Vec<RecognitionResult>, ScanError> =
        stream::iter(units.into_iter().map(|unit| {
            let backend = Arc::clone(&backend);
            let completed = &completed;
            async move {
                let result = recognize_unit(
                    unit,
                    backend.as_ref(),
                    options,
                    config.ocr_timeout_secs,
                    progress,
                    total,
                )
                .await;
                if result.is_ok() {
                    completed.fetch_add(1, Ordering::SeqCst);
                }
                result
            }
        }))
        .buffer_unordered(concurrency)
        .try_collect()
        .await;

    if let Some(cb) = progress {
        cb.on_scan_complete(total, completed.load(Ordering::SeqCst));
    }

    let mut results = outcome?;
    results.sort_by_key(|r| r.ordinal);

    // Ordinals must be exactly 0..n after aggregation.
    if let Some((expected, found)) = results
        .iter()
        .enumerate()
        .find(|(i, r)| r.ordinal != *i)
        .map(|(i, r)| (i, r.ordinal))
    {
        return Err(ScanError::Internal(format!(
            "result ordinals are not contiguous: expected {expected}, found {found}"
        )));
    }

    Ok(results)
}

/// One backend call under the per-call timeout, then post-processing.
async fn recognize_unit(
    unit: ImageUnit,
    backend: &dyn OcrBackend,
    options: &RecognitionOptions,
    timeout_secs: u64,
    progress: Option<&ProgressCallback>,
    total: usize,
) -> Result<RecognitionResult, ScanError> {
    let ordinal = unit.ordinal;
    if let Some(cb) = progress {
        cb.on_unit_start(ordinal, total);
    }

    let start = Instant::now();
    let call = backend.recognize(&unit.pixels, options);
    let outcome = match timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(Ok(raw)) => Ok(finish_text(&raw, options, backend.capabilities())),
        Ok(Err(source)) => Err(ScanError::OcrBackend {
            ordinal,
            backend: backend.name().to_string(),
            source,
        }),
        Err(_) => Err(ScanError::OcrTimeout {
            ordinal,
            secs: timeout_secs,
        }),
    };

    match &outcome {
        Ok(text) => {
            debug!(
                ordinal,
                "Recognised {}x{} unit: {} chars in {:?}",
                unit.pixels.width(),
                unit.pixels.height(),
                text.len(),
                start.elapsed()
            );
            if let Some(cb) = progress {
                cb.on_unit_complete(ordinal, total, text.len());
            }
        }
        Err(e) => {
            warn!(ordinal, "Unit failed: {}", e);
            if let Some(cb) = progress {
                cb.on_unit_error(ordinal, total, &e.to_string());
            }
        }
    }

    outcome.map(|text| RecognitionResult { ordinal, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCapabilities, BackendError};
    use crate::pipeline::sniff::ImageKind;
    use async_trait::async_trait;
    use image::{GrayImage, Luma};

    /// Echoes the unit's width; units are built `ordinal + 1` pixels wide.
    /// Earlier ordinals sleep longer so completion order is reversed.
    struct WidthEcho {
        fail_width: Option<u32>,
        hang: bool,
    }

    #[async_trait]
    impl OcrBackend for WidthEcho {
        fn name(&self) -> &str {
            "width-echo"
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities {
                hocr: false,
                whitelist: false,
                clean_text: true,
            }
        }

        async fn recognize(
            &self,
            image: &GrayImage,
            _options: &RecognitionOptions,
        ) -> Result<String, BackendError> {
            let width = image.width();
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            tokio::time::sleep(Duration::from_millis(10 * (6 - width.min(5)) as u64)).await;
            if Some(width) == self.fail_width {
                return Err(BackendError::Engine("exit status 1".into()));
            }
            Ok(format!(" w{width} "))
        }
    }

    fn units(n: usize) -> Vec<ImageUnit> {
        (0..n)
            .map(|i| ImageUnit::new(i, GrayImage::from_pixel(i as u32 + 1, 1, Luma([0])), ImageKind::Png))
            .collect()
    }

    fn opts() -> RecognitionOptions {
        RecognitionOptions::new("width-echo", &["eng"]).with_trim(true)
    }

    #[tokio::test]
    async fn results_follow_ordinals_not_completion() {
        let backend = Arc::new(WidthEcho {
            fail_width: None,
            hang: false,
        });
        let config = ScanConfig::builder().concurrency(5).build().unwrap();
        let results = dispatch_units(units(5), backend, &opts(), &config).await.unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["w1", "w2", "w3", "w4", "w5"]);
    }

    #[tokio::test]
    async fn first_failure_aborts_batch() {
        let backend = Arc::new(WidthEcho {
            fail_width: Some(3),
            hang: false,
        });
        let config = ScanConfig::builder().concurrency(2).build().unwrap();
        let err = dispatch_units(units(4), backend, &opts(), &config)
            .await
            .unwrap_err();
        match err {
            ScanError::OcrBackend { ordinal, backend, .. } => {
                assert_eq!(ordinal, 2);
                assert_eq!(backend, "width-echo");
            }
            other => panic!("expected OcrBackend, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let backend = Arc::new(WidthEcho {
            fail_width: None,
            hang: true,
        });
        let config = ScanConfig::builder().ocr_timeout_secs(1).build().unwrap();
        let err = dispatch_units(units(1), backend, &opts(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::OcrTimeout { ordinal: 0, secs: 1 }));
    }

    #[tokio::test]
    async fn empty_batch_is_internal_error() {
        let backend = Arc::new(WidthEcho {
            fail_width: None,
            hang: false,
        });
        let err = dispatch_units(Vec::new(), backend, &opts(), &ScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Internal(_)));
    }
}
