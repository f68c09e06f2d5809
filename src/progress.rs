//! Progress-callback trait for per-page scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive events
//! as the scanner works through a document.
//!
//! # Example
//!
//! ```rust
//! use barscan::{ScanConfig, ScanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct BarcodeCounter {
//!     found: AtomicUsize,
//! }
//!
//! impl ScanProgressCallback for BarcodeCounter {
//!     fn on_page_complete(&self, _page_num: usize, _total_pages: usize, barcodes: usize) {
//!         self.found.fetch_add(barcodes, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(BarcodeCounter { found: AtomicUsize::new(0) });
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the scanner as it processes each page.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the page
/// events arrive from several blocking-pool threads at once. All methods
/// default to no-ops.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once after the document is loaded, before any page is scanned.
    fn on_scan_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before the first region of a page is planned.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages selected for scanning
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been fully scanned.
    ///
    /// # Arguments
    /// * `barcodes` — unique barcodes found on the page (may be zero)
    fn on_page_complete(&self, page_num: usize, total_pages: usize, barcodes: usize) {
        let _ = (page_num, total_pages, barcodes);
    }

    /// Called once after all pages have been scanned.
    ///
    /// # Arguments
    /// * `pages_with_barcodes` — pages that yielded at least one barcode
    fn on_scan_complete(&self, total_pages: usize, pages_with_barcodes: usize) {
        let _ = (total_pages, pages_with_barcodes);
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
        barcodes: AtomicUsize,
        detected_pages: AtomicUsize,
    }

    impl ScanProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, barcodes: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.barcodes.fetch_add(barcodes, Ordering::SeqCst);
        }

        fn on_scan_complete(&self, _total_pages: usize, pages_with_barcodes: usize) {
            self.detected_pages.store(pages_with_barcodes, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_scan_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 2);
        cb.on_scan_complete(5, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 3);
        tracker.on_page_start(2, 2);
        tracker.on_page_complete(2, 2, 0);
        tracker.on_scan_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.barcodes.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.detected_pages.load(Ordering::SeqCst), 1);
    }
}
