//! # barscan
//!
//! Find and decode barcodes in scanned documents: single images, multi-page
//! TIFF and PDF.
//!
//! ## Why this crate?
//!
//! Decoders such as ZXing expect a bitmap that contains little more than the
//! symbol. A 300 DPI page scan is the opposite: a retail barcode covers a
//! fraction of a percent of the page, is often smudged or unevenly lit, and
//! may sit next to three others. This crate runs a detector over several
//! regions and scales of each page, crops every candidate with room for its
//! quiet zone, and tries a fixed cascade of binarisations until the decoder
//! reads it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Load      decode image / every TIFF IFD / rasterise PDF via pdfium
//!  ├─ 3. Regions   4 overlapping quadrants + full page + half-resolution page
//!  ├─ 4. Detect    injected CandidateDetector, confidence gate
//!  ├─ 5. Crop      padding + aspect-ratio widening
//!  ├─ 6. Enhance   up to 9 variants, computed lazily
//!  ├─ 7. Decode    injected SymbolDecoder, first success wins
//!  └─ 8. Aggregate dedup by content, map to page coordinates
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use barscan::{BarcodeScanner, FullFrameDetector, RxingDecoder, ScanConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = BarcodeScanner::new(
//!         ScanConfig::default(),
//!         Arc::new(FullFrameDetector),
//!         Arc::new(RxingDecoder),
//!     );
//!     let result = scanner.scan("delivery-notes.pdf").await?;
//!     println!("{}", serde_json::to_string_pretty(&result.report())?);
//!     Ok(())
//! }
//! ```
//!
//! ## Bringing your own detector
//!
//! [`FullFrameDetector`] hands every region to the decoder whole, which is
//! enough for clean documents. For dense pages plug in a trained model by
//! implementing [`CandidateDetector`]; boxes are reported in the pixel
//! coordinates of the bitmap you are given and mapped back to the page for
//! you.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `barscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `rxing` | via `cli` | Built-in [`RxingDecoder`] |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! barscan = { version = "0.1", default-features = false, features = ["rxing"] }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scan;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CropSettings, EnhanceSettings, PageSelection, PdfiumLibrary, ScanConfig, ScanConfigBuilder,
    Symbology,
};
pub use error::{DetectorError, RegionError, ScanError};
pub use output::{BoundingBox, DecodedBarcode, DocumentResult, PageResult, ScanReport};
pub use pipeline::decode::{DecodeHints, DecodedSymbol, SymbolDecoder};
pub use pipeline::detect::{CandidateDetector, Detection, FullFrameDetector};
pub use pipeline::enhance::Variant;
pub use pipeline::load::{load_pages, ContentType, LoadOptions, Page};
#[cfg(feature = "rxing")]
pub use pipeline::rxing_decoder::RxingDecoder;
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use scan::{write_report, BarcodeScanner};
pub use stream::PageStream;
