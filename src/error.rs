//! Error types for the barscan library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScanError`] — **Fatal**: the document cannot be scanned at all
//!   (unknown content type, unparsable bytes, wrong password, bad config).
//!   Returned as `Err(ScanError)` from the top-level `scan*` functions and
//!   never accompanied by partial results.
//!
//! * [`RegionError`] — **Non-fatal**: one detector pass over one region
//!   failed or timed out. The remaining regions of the page are still
//!   processed and the error is kept on [`crate::output::PageResult`] for
//!   diagnostics.
//!
//! A candidate that no enhancement variant manages to decode is not an error
//! of either kind; it simply contributes no barcode.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the barscan library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The content type is not one of PDF, TIFF or a supported raster image.
    #[error("Unsupported document format '{content_type}'\nSupported: PDF, TIFF, PNG, JPEG, BMP, GIF, WebP.")]
    UnsupportedFormat { content_type: String },

    /// The bytes claim a supported format but cannot be parsed.
    #[error("Document is corrupt: {detail}")]
    CorruptDocument { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// The page selection matches no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF input needs a pdfium shared library. You can:\n\
  • Install libpdfium system-wide (e.g. from bblanchon/pdfium-binaries).\n\
  • Pass --pdfium-lib /path/to/libpdfium to use a specific copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single region of a single page.
///
/// Stored on [`crate::output::PageResult`]; page processing continues with
/// the next region.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RegionError {
    /// The detector returned an error (or panicked) for this region.
    #[error("Page {page}, region {region}: detector failed: {detail}")]
    DetectorFailure {
        page: usize,
        region: usize,
        detail: String,
    },

    /// The detector did not answer within the configured deadline.
    #[error("Page {page}, region {region}: detector timed out after {millis}ms")]
    DetectorTimeout {
        page: usize,
        region: usize,
        millis: u64,
    },
}

/// Error reported by a [`crate::pipeline::detect::CandidateDetector`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DetectorError {
    pub message: String,
}

impl DetectorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = ScanError::UnsupportedFormat {
            content_type: "text/plain".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("text/plain"), "got: {msg}");
        assert!(msg.contains("TIFF"));
    }

    #[test]
    fn page_out_of_range_display() {
        let e = ScanError::PageOutOfRange { page: 9, total: 3 };
        assert!(e.to_string().contains("Page 9"));
        assert!(e.to_string().contains("3 pages"));
    }

    #[test]
    fn region_error_display() {
        let e = RegionError::DetectorTimeout {
            page: 2,
            region: 6,
            millis: 1500,
        };
        assert!(e.to_string().contains("region 6"));
        assert!(e.to_string().contains("1500ms"));
    }

    #[test]
    fn region_error_serialises_with_kind_tag() {
        let e = RegionError::DetectorFailure {
            page: 1,
            region: 3,
            detail: "session lost".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "detectorFailure");
        assert_eq!(json["region"], 3);
    }

    #[test]
    fn detector_error_message() {
        let e = DetectorError::new("bad tensor shape");
        assert_eq!(e.to_string(), "bad tensor shape");
    }
}
