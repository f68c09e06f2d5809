//! Result types produced by the scanner.
//!
//! [`DocumentResult`] is the pipeline's own output: exactly one
//! [`PageResult`] per scanned page, including pages without barcodes.
//! [`ScanReport`] is the caller-facing view serialised as JSON, which drops
//! empty pages and adds document-level totals.

use crate::config::Symbology;
use crate::error::RegionError;
use crate::pipeline::enhance::Variant;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One decoded barcode. Created on the first successful decode of its
/// content on a page and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedBarcode {
    /// Decoded text.
    pub content: String,
    /// Symbology reported by the decoder.
    pub format: Symbology,
    /// Confidence of the detection the barcode was cropped from.
    pub confidence: f32,
    /// Location in page pixel coordinates.
    pub original_location: BoundingBox,
    /// Location in the pixel coordinates of the originating region's bitmap.
    pub region_location: BoundingBox,
    /// Enhancement variant that produced the successful decode.
    #[serde(skip)]
    pub variant: Variant,
}

/// Everything found on one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// 1-indexed page number within the source document.
    pub page_number: usize,
    /// Region (1–6) in which the page's first barcode was found.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub region_number: Option<usize>,
    /// Barcodes in first-seen order, unique by content.
    pub barcodes: Vec<DecodedBarcode>,
    /// Regions whose detector pass failed. Empty on a clean scan.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub region_errors: Vec<RegionError>,
}

impl PageResult {
    pub fn empty(page_number: usize) -> Self {
        Self {
            page_number,
            ..Default::default()
        }
    }

    pub fn has_barcodes(&self) -> bool {
        !self.barcodes.is_empty()
    }
}

/// Output of a full document scan: one entry per scanned page, in page order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentResult {
    pub pages: Vec<PageResult>,
}

impl DocumentResult {
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn detected_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.has_barcodes()).count()
    }

    pub fn total_barcodes(&self) -> usize {
        self.pages.iter().map(|p| p.barcodes.len()).sum()
    }

    /// Iterate every barcode of the document with its page number.
    pub fn barcodes(&self) -> impl Iterator<Item = (usize, &DecodedBarcode)> {
        self.pages
            .iter()
            .flat_map(|p| p.barcodes.iter().map(move |b| (p.page_number, b)))
    }

    /// Caller-facing report; pages without barcodes are omitted.
    pub fn report(&self) -> ScanReport {
        self.build_report(false)
    }

    /// Like [`DocumentResult::report`] but keeps pages without barcodes.
    pub fn report_all_pages(&self) -> ScanReport {
        self.build_report(true)
    }

    fn build_report(&self, keep_empty: bool) -> ScanReport {
        ScanReport {
            total_pages: self.total_pages(),
            detected_pages: self.detected_pages(),
            total_barcodes: self.total_barcodes(),
            results: self
                .pages
                .iter()
                .filter(|p| keep_empty || p.has_barcodes())
                .cloned()
                .collect(),
        }
    }
}

/// JSON document returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub total_pages: usize,
    pub detected_pages: usize,
    pub total_barcodes: usize,
    pub results: Vec<PageResult>,
}
