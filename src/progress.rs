//! Progress-callback trait for per-unit scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to observe a
//! request as its units (cropped regions or PDF pages) are recognised.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr::{ScanConfig, ScanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ScanProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, ordinal: usize, total_units: usize, text_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("unit {ordinal} done ({done}/{total_units}, {text_len} bytes)");
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the dispatcher as it processes each unit.
///
/// Units run concurrently, so `on_unit_start`, `on_unit_complete` and
/// `on_unit_error` may be called from different tasks at once.
/// Implementations must protect shared mutable state themselves.
/// Ordinals are 0-based positions in the request.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once, after pagination/cropping, before any OCR call.
    fn on_scan_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before the backend is invoked for a unit.
    fn on_unit_start(&self, ordinal: usize, total_units: usize) {
        let _ = (ordinal, total_units);
    }

    /// Called when a unit is recognised.
    fn on_unit_complete(&self, ordinal: usize, total_units: usize, text_len: usize) {
        let _ = (ordinal, total_units, text_len);
    }

    /// Called when a unit fails. The request is aborted after this.
    fn on_unit_error(&self, ordinal: usize, total_units: usize, error: &str) {
        let _ = (ordinal, total_units, error);
    }

    /// Called once when the dispatch stage ends, successfully or not.
    ///
    /// `success_count` counts units that finished before the batch ended;
    /// units cancelled by a sibling failure are not counted.
    fn on_scan_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ScanProgressCallback for TrackingCallback {
        fn on_unit_start(&self, _ordinal: usize, _total_units: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_complete(&self, _ordinal: usize, _total_units: usize, _text_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _ordinal: usize, _total_units: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_scan_start(2);
        cb.on_unit_start(0, 2);
        cb.on_unit_complete(0, 2, 12);
        cb.on_unit_error(1, 2, "tesseract exited with status 1");
        cb.on_scan_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_unit_start(0, 2);
        tracker.on_unit_complete(0, 2, 10);
        tracker.on_unit_start(1, 2);
        tracker.on_unit_error(1, 2, "timeout");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
