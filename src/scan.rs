//! Pipeline orchestrator: sequence the stages for one scan request.
//!
//! ## State machine
//!
//! ```text
//! RECEIVED ─▶ TYPE_CHECKED ─┬─▶ GRAYSCALED ─▶ [CROPPED] ─┬─▶ DISPATCHED(n) ─▶ AGGREGATED ─▶ COMPLETED
//!                           └─▶ PAGINATED ───────────────┘
//! ```
//!
//! Any input-rejection error ends in `REJECTED`, any other failure in
//! `FAILED`. Every transition is logged at `debug!` and the terminal state
//! at `info!`/`warn!`.
//!
//! ## Variants
//!
//! | Variant | Payload | PDF | Regions |
//! |---------|---------|-----|---------|
//! | [`scan_file`] | raw bytes | one unit per page | none |
//! | [`scan_cropped_file`] | raw bytes | rejected | required |
//! | [`scan_base64`] | base64 / data URL | one unit per page | none |
//! | [`scan_cropped_base64`] | base64 / data URL | rejected | required |
//!
//! A request producing a single unit returns [`ScanOutput::Single`], any
//! other count returns [`ScanOutput::Multiple`] in unit order.

use crate::backend::BackendRegistry;
use crate::config::ScanConfig;
use crate::error::{PipelineState, ScanError};
use crate::output::{ImageUnit, ScanOutput};
use crate::pipeline::sniff::{self, ImageKind, PayloadKind};
use crate::pipeline::{crop, dispatch, grayscale, render};
use crate::request::{RecognitionOptions, RegionDescriptor, ScanRequest};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tracks and logs the state of one request.
struct StateTrace {
    variant: &'static str,
    state: PipelineState,
}

impl StateTrace {
    fn new(variant: &'static str) -> Self {
        debug!(variant, state = %PipelineState::Received, "Scan request received");
        Self {
            variant,
            state: PipelineState::Received,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug!(variant = self.variant, "{} → {}", self.state, next);
        self.state = next;
    }
}

/// Run one scan request to completion.
///
/// Options, backend selection and region lists are validated before any
/// decoding or OCR work; a rejected request never reaches a backend.
pub async fn scan(
    request: ScanRequest,
    registry: &BackendRegistry,
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    let start = Instant::now();
    let mut trace = StateTrace::new(request.variant());

    let result = run(request, registry, config, &mut trace).await;

    match &result {
        Ok(output) => {
            trace.advance(PipelineState::Completed);
            info!(
                variant = trace.variant,
                units = output.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Scan completed"
            );
        }
        Err(e) => {
            trace.advance(e.terminal_state());
            warn!(
                variant = trace.variant,
                code = e.code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Scan {}: {}",
                trace.state,
                e
            );
        }
    }
    result
}

async fn run(
    request: ScanRequest,
    registry: &BackendRegistry,
    config: &ScanConfig,
    trace: &mut StateTrace,
) -> Result<ScanOutput, ScanError> {
    let variant = request.variant();

    let (bytes, kind, regions, options) = match request {
        ScanRequest::File { bytes, options } => {
            let kind = sniff::classify(&bytes)?;
            (bytes, kind, None, options)
        }
        ScanRequest::CroppedFile {
            bytes,
            regions,
            options,
        } => {
            let kind = PayloadKind::Image(sniff::classify_image(&bytes, variant)?);
            (bytes, kind, Some(regions), options)
        }
        ScanRequest::Base64 { payload, options } => {
            let decoded = sniff::decode_base64(&payload)?;
            (decoded.bytes, decoded.kind, None, options)
        }
        ScanRequest::CroppedBase64 {
            payload,
            regions,
            options,
        } => {
            let decoded = sniff::decode_base64(&payload)?;
            if decoded.kind.is_pdf() {
                return Err(ScanError::PdfNotAllowed { variant });
            }
            (decoded.bytes, decoded.kind, Some(regions), options)
        }
    };
    trace.advance(PipelineState::TypeChecked);
    debug!(variant, "Payload is {} ({} bytes)", kind.mime_type(), bytes.len());

    let options = options.normalized(config)?;
    let backend = registry.resolve(&options)?;
    if regions.as_ref().is_some_and(|r| r.is_empty()) {
        return Err(ScanError::MalformedRegions {
            reason: "region list is empty".into(),
        });
    }

    let units = match kind {
        PayloadKind::Pdf => {
            let units = render::rasterize(bytes, config).await?;
            trace.advance(PipelineState::Paginated);
            units
        }
        PayloadKind::Image(image_kind) => image_units(bytes, image_kind, regions, trace).await?,
    };

    let total = units.len();
    trace.advance(PipelineState::Dispatched);
    debug!(units = total, backend = backend.name(), "Fan-out");

    let results = dispatch::dispatch_units(units, backend, &options, config).await?;
    trace.advance(PipelineState::Aggregated);

    Ok(ScanOutput::from_results(results))
}

/// Decode, grayscale and optionally crop an image on the blocking pool.
async fn image_units(
    bytes: Vec<u8>,
    kind: ImageKind,
    regions: Option<Vec<RegionDescriptor>>,
    trace: &mut StateTrace,
) -> Result<Vec<ImageUnit>, ScanError> {
    let cropping = regions.is_some();
    let units = tokio::task::spawn_blocking(move || -> Result<Vec<ImageUnit>, ScanError> {
        let img = grayscale::decode(&bytes, kind)?;
        match regions {
            None => Ok(vec![ImageUnit::new(0, grayscale::to_grayscale(&img), kind)]),
            Some(regions) => crop::crop(&img, &regions, kind),
        }
    })
    .await
    .map_err(|e| ScanError::Internal(format!("Decode task panicked: {}", e)))??;

    trace.advance(PipelineState::Grayscaled);
    if cropping {
        trace.advance(PipelineState::Cropped);
    }
    Ok(units)
}

/// Whole-file scan: an image yields one text, a PDF one text per page.
pub async fn scan_file(
    bytes: Vec<u8>,
    options: RecognitionOptions,
    registry: &BackendRegistry,
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    scan(ScanRequest::File { bytes, options }, registry, config).await
}

/// Cropped-file scan: one text per region, in region order.
pub async fn scan_cropped_file(
    bytes: Vec<u8>,
    regions: Vec<RegionDescriptor>,
    options: RecognitionOptions,
    registry: &BackendRegistry,
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    scan(
        ScanRequest::CroppedFile {
            bytes,
            regions,
            options,
        },
        registry,
        config,
    )
    .await
}

/// Base64 scan: image or PDF, auto-detected.
pub async fn scan_base64(
    payload: impl Into<String>,
    options: RecognitionOptions,
    registry: &BackendRegistry,
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    scan(
        ScanRequest::Base64 {
            payload: payload.into(),
            options,
        },
        registry,
        config,
    )
    .await
}

/// Base64 cropped scan: images only.
pub async fn scan_cropped_base64(
    payload: impl Into<String>,
    regions: Vec<RegionDescriptor>,
    options: RecognitionOptions,
    registry: &BackendRegistry,
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    scan(
        ScanRequest::CroppedBase64 {
            payload: payload.into(),
            regions,
            options,
        },
        registry,
        config,
    )
    .await
}

/// Synchronous wrapper around [`scan`] for callers without a runtime.
///
/// Creates a fresh tokio runtime; do not call from inside one.
pub fn scan_sync(
    request: ScanRequest,
    registry: &BackendRegistry,
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scan(request, registry, config))
}
