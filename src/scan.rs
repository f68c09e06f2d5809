//! Eager (full-document) scan entry points.
//!
//! ## Why eager vs. streaming?
//!
//! [`BarcodeScanner::scan`] waits for every page and returns one
//! [`DocumentResult`] in page order. Use
//! [`BarcodeScanner::scan_stream`](crate::stream) instead when you want pages
//! as they finish, e.g. to report barcodes from a 500-page batch scan before
//! the last page is done.
//!
//! ## Threading
//!
//! Page scanning is CPU-bound. Each page runs on tokio's blocking pool via
//! `spawn_blocking`, `concurrency` pages at a time. Pages share nothing but
//! the read-only configuration and capabilities, so results do not depend on
//! the concurrency level.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::output::{DocumentResult, PageResult, ScanReport};
use crate::pipeline::decode::SymbolDecoder;
use crate::pipeline::detect::CandidateDetector;
use crate::pipeline::input;
use crate::pipeline::load::{self, ContentType, LoadOptions, Page};
use crate::pipeline::page::PagePipeline;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Scans documents for barcodes with an injected detector and decoder.
///
/// # Example
/// ```rust,no_run
/// use barscan::{BarcodeScanner, FullFrameDetector, ScanConfig};
/// # use barscan::{DecodeHints, DecodedSymbol, SymbolDecoder};
/// # struct MyDecoder;
/// # impl SymbolDecoder for MyDecoder {
/// #     fn decode(&self, _: &image::GrayImage, _: &DecodeHints) -> Option<DecodedSymbol> { None }
/// # }
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let scanner = BarcodeScanner::new(
///     ScanConfig::default(),
///     Arc::new(FullFrameDetector),
///     Arc::new(MyDecoder),
/// );
/// let result = scanner.scan("invoice.pdf").await?;
/// for (page, barcode) in result.barcodes() {
///     println!("page {page}: {} {}", barcode.format, barcode.content);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BarcodeScanner {
    pipeline: PagePipeline,
    config: Arc<ScanConfig>,
}

impl BarcodeScanner {
    pub fn new(
        config: ScanConfig,
        detector: Arc<dyn CandidateDetector>,
        decoder: Arc<dyn SymbolDecoder>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            pipeline: PagePipeline::new(Arc::clone(&config), detector, decoder),
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan already-loaded pages on the calling thread, in the given order.
    ///
    /// Returns exactly one [`PageResult`] per input page.
    pub fn scan_pages(&self, pages: &[Page]) -> DocumentResult {
        let total = pages.len();
        self.notify_start(total);
        let results: Vec<PageResult> = pages
            .iter()
            .map(|page| self.scan_one(page, total))
            .collect();
        let doc = DocumentResult { pages: results };
        self.notify_complete(doc.total_pages(), doc.detected_pages());
        doc
    }

    /// Load and scan a document held in memory.
    ///
    /// # Errors
    /// Fails only when the document cannot be loaded
    /// ([`ScanError::CorruptDocument`], [`ScanError::PasswordRequired`], …).
    /// Region-level problems end up in [`PageResult::region_errors`].
    pub async fn scan_bytes(
        &self,
        bytes: Vec<u8>,
        content_type: ContentType,
    ) -> Result<DocumentResult, ScanError> {
        let start = Instant::now();
        let pages =
            load::load_pages_async(bytes, content_type, LoadOptions::from(self.config.as_ref()))
                .await?;
        let total = pages.len();
        self.notify_start(total);

        let mut results: Vec<PageResult> = stream::iter(pages.into_iter().map(|page| {
            let scanner = self.clone();
            async move {
                let number = page.number;
                tokio::task::spawn_blocking(move || scanner.scan_one(&page, total))
                    .await
                    .map_err(|e| {
                        ScanError::Internal(format!("Page {} task panicked: {}", number, e))
                    })
            }
        }))
        .buffer_unordered(self.config.concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

        // Sort by page number for consistent output
        results.sort_by_key(|p| p.page_number);
        let doc = DocumentResult { pages: results };

        info!(
            "Scan complete: {} barcode(s) on {}/{} page(s) in {}ms",
            doc.total_barcodes(),
            doc.detected_pages(),
            doc.total_pages(),
            start.elapsed().as_millis()
        );
        self.notify_complete(doc.total_pages(), doc.detected_pages());
        Ok(doc)
    }

    /// Scan a local file or HTTP(S) URL.
    ///
    /// For URLs a specific response `Content-Type` decides the format.
    /// Otherwise the magic bytes decide, with the file extension as the
    /// last resort.
    pub async fn scan(&self, input_str: impl AsRef<str>) -> Result<DocumentResult, ScanError> {
        self.scan_as(input_str, None).await
    }

    /// Like [`BarcodeScanner::scan`] with an explicit content type.
    pub async fn scan_as(
        &self,
        input_str: impl AsRef<str>,
        content_type: Option<ContentType>,
    ) -> Result<DocumentResult, ScanError> {
        let input_str = input_str.as_ref();
        info!("Starting scan: {}", input_str);
        let resolved = input::resolve_input(
            input_str,
            content_type,
            self.config.download_timeout_secs,
        )
        .await?;
        self.scan_bytes(resolved.bytes, resolved.content_type).await
    }

    /// Synchronous wrapper around [`BarcodeScanner::scan`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn scan_sync(&self, input_str: impl AsRef<str>) -> Result<DocumentResult, ScanError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.scan(input_str))
    }

    /// Scan and write the JSON [`crate::output::ScanReport`] to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn scan_to_file(
        &self,
        input_str: impl AsRef<str>,
        output_path: impl AsRef<Path>,
    ) -> Result<DocumentResult, ScanError> {
        let doc = self.scan(input_str).await?;
        write_report(output_path.as_ref(), &doc.report(), true).await?;
        Ok(doc)
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    pub(crate) fn scan_one(&self, page: &Page, total: usize) -> PageResult {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_page_start(page.number, total);
        }
        let result = self.pipeline.scan_page(page);
        if let Some(cb) = cb {
            cb.on_page_complete(page.number, total, result.barcodes.len());
        }
        result
    }

    pub(crate) fn notify_start(&self, total: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_scan_start(total);
        }
    }

    pub(crate) fn notify_complete(&self, total: usize, detected: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_scan_complete(total, detected);
        }
    }
}

/// Serialise `report` as JSON and write it atomically to `path`.
pub async fn write_report(path: &Path, report: &ScanReport, pretty: bool) -> Result<(), ScanError> {
    let json = if pretty {
        serde_json::to_vec_pretty(report)
    } else {
        serde_json::to_vec(report)
    }
    .map_err(|e| ScanError::Internal(format!("JSON serialisation failed: {}", e)))?;
    write_atomic(path, &json).await
}

/// Write `data` next to `path` and rename it into place.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), ScanError> {
    let write_err = |source| ScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, data).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/report.json");
        write_atomic(&target, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
        assert!(!target.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn report_is_written_as_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report.json");
        let report = DocumentResult {
            pages: vec![PageResult::empty(1)],
        }
        .report();
        write_report(&target, &report, false).await.unwrap();
        let text = std::fs::read_to_string(&target).unwrap();
        assert_eq!(
            text,
            r#"{"totalPages":1,"detectedPages":0,"totalBarcodes":0,"results":[]}"#
        );
    }
}
