//! Pipeline stages for image and PDF OCR.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and the orchestrator in [`crate::scan`] only sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ sniff ──┬──▶ grayscale ──▶ crop? ──┬──▶ dispatch ──▶ postprocess
//!  (raw/b64) (type)  │     (image)      (regions)│     (backend)    (contract)
//!                    └──▶ render ────────────────┘
//!                          (pdfium, per page)
//! ```
//!
//! 1. [`input`]     read a CLI path or URL into bytes
//! 2. [`sniff`]     decode base64 / data URLs and classify by magic number
//! 3. [`grayscale`] decode an image and reduce it to 8-bit luma
//! 4. [`crop`]      validate region descriptors and cut one unit per region
//! 5. [`render`]    rasterise every PDF page through a `PageRasterizer`; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 6. [`encode`]    PNG-encode a unit for a backend
//! 7. [`dispatch`]  run the backend over all units with bounded concurrency
//! 8. [`postprocess`] make every backend's output honour the request options

pub mod crop;
pub mod dispatch;
pub mod encode;
pub mod grayscale;
pub mod input;
pub mod postprocess;
pub mod render;
pub mod sniff;
