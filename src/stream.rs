//! Streaming scan API: emit pages as they complete.
//!
//! ## Why stream?
//!
//! Batch scans run to hundreds of pages. A stream lets callers act on the
//! barcodes of early pages (route a document, start a lookup) while later
//! pages are still being scanned, and keeps only in-flight results alive.
//!
//! Unlike the eager [`BarcodeScanner::scan_bytes`] which returns only after
//! all pages finish, [`BarcodeScanner::scan_stream`] yields a [`PageResult`]
//! per page as it completes. With `concurrency > 1` pages may arrive out of
//! order (sort by `page_number` if order matters). The progress callback's
//! `on_scan_complete` fires once the last page has been yielded.

use crate::error::ScanError;
use crate::output::PageResult;
use crate::pipeline::load::{self, ContentType, LoadOptions};
use crate::scan::BarcodeScanner;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
///
/// An item is `Err` only when the page task itself died; region failures are
/// reported inside the [`PageResult`].
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, ScanError>> + Send>>;

impl BarcodeScanner {
    /// Load a document and stream its page results as they complete.
    ///
    /// # Returns
    /// - `Ok(PageStream)` — one item per selected page
    /// - `Err(ScanError)` — the document could not be loaded
    ///
    /// # Example
    /// ```rust,no_run
    /// use barscan::{BarcodeScanner, ContentType, FullFrameDetector, ScanConfig};
    /// # use barscan::{DecodeHints, DecodedSymbol, SymbolDecoder};
    /// # struct MyDecoder;
    /// # impl SymbolDecoder for MyDecoder {
    /// #     fn decode(&self, _: &image::GrayImage, _: &DecodeHints) -> Option<DecodedSymbol> { None }
    /// # }
    /// use futures::StreamExt;
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let scanner = BarcodeScanner::new(ScanConfig::default(), Arc::new(FullFrameDetector), Arc::new(MyDecoder));
    /// let bytes = std::fs::read("batch.tif")?;
    /// let mut pages = scanner.scan_stream(bytes, ContentType::Tiff).await?;
    /// while let Some(page) = pages.next().await {
    ///     let page = page?;
    ///     println!("page {}: {} barcode(s)", page.page_number, page.barcodes.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scan_stream(
        &self,
        bytes: Vec<u8>,
        content_type: ContentType,
    ) -> Result<PageStream, ScanError> {
        let pages =
            load::load_pages_async(bytes, content_type, LoadOptions::from(self.config())).await?;
        let total = pages.len();
        info!("Streaming scan of {} page(s)", total);
        self.notify_start(total);

        let concurrency = self.config().concurrency;
        let scanner = self.clone();
        let s = stream::iter(pages.into_iter().map(move |page| {
            let scanner = scanner.clone();
            async move {
                let number = page.number;
                tokio::task::spawn_blocking(move || scanner.scan_one(&page, total))
                    .await
                    .map_err(|e| {
                        ScanError::Internal(format!("Page {} task panicked: {}", number, e))
                    })
            }
        }))
        .buffer_unordered(concurrency);

        let detected = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&detected);
        let s = s.inspect(move |item| {
            if matches!(item, Ok(page) if page.has_barcodes()) {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        // Yields nothing; only reports completion after the last page.
        let finisher = self.clone();
        let done = stream::once(async move {
            finisher.notify_complete(total, detected.load(Ordering::Relaxed));
        })
        .filter_map(|()| async { None::<Result<PageResult, ScanError>> });

        Ok(Box::pin(s.chain(done)))
    }
}
