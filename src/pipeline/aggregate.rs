//! Per-page accumulation of decoded barcodes.
//!
//! Overlapping quadrants, the full page and the half-resolution copy all see
//! the same physical barcode, so most symbols are decoded several times. The
//! first decode of a content string wins; later ones are discarded.
//!
//! Locations are reported twice: as the detector saw them (region bitmap
//! coordinates) and mapped back to the page with
//! `page = origin + region / scale`. The division matters for the
//! half-resolution region, whose bitmap coordinates are half the page's.

use crate::error::RegionError;
use crate::output::{BoundingBox, DecodedBarcode, PageResult};
use crate::pipeline::decode::DecodeOutcome;
use crate::pipeline::detect::Detection;
use crate::pipeline::regions::RegionLayout;
use std::collections::HashSet;
use tracing::debug;

/// Map a box from region bitmap coordinates to page coordinates.
pub fn page_location(layout: &RegionLayout, region_box: BoundingBox) -> BoundingBox {
    let s = layout.scale;
    BoundingBox::new(
        layout.origin_x as f32 + region_box.x / s,
        layout.origin_y as f32 + region_box.y / s,
        region_box.width / s,
        region_box.height / s,
    )
}

/// Builds the [`PageResult`] of one page.
#[derive(Debug)]
pub struct ResultAggregator {
    page_number: usize,
    seen: HashSet<String>,
    barcodes: Vec<DecodedBarcode>,
    region_number: Option<usize>,
    region_errors: Vec<RegionError>,
}

impl ResultAggregator {
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            seen: HashSet::new(),
            barcodes: Vec::new(),
            region_number: None,
            region_errors: Vec::new(),
        }
    }

    /// Record a decode. Returns `false` when the content was already seen on
    /// this page and the decode was discarded.
    pub fn record(
        &mut self,
        layout: &RegionLayout,
        detection: &Detection,
        outcome: DecodeOutcome,
    ) -> bool {
        if self.seen.contains(&outcome.symbol.text) {
            debug!(
                "Page {}: '{}' already recorded, ignoring copy from region {}",
                self.page_number, outcome.symbol.text, layout.index
            );
            return false;
        }
        self.seen.insert(outcome.symbol.text.clone());
        self.region_number.get_or_insert(layout.index);

        let region_location = detection.region_box();
        self.barcodes.push(DecodedBarcode {
            content: outcome.symbol.text,
            format: outcome.symbol.format,
            confidence: detection.confidence,
            original_location: page_location(layout, region_location),
            region_location,
            variant: outcome.variant,
        });
        true
    }

    pub fn record_error(&mut self, error: RegionError) {
        self.region_errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    pub fn finish(self) -> PageResult {
        PageResult {
            page_number: self.page_number,
            region_number: self.region_number,
            barcodes: self.barcodes,
            region_errors: self.region_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Symbology;
    use crate::pipeline::decode::DecodedSymbol;
    use crate::pipeline::enhance::Variant;

    fn layout(index: usize, x: u32, y: u32, scale: f32) -> RegionLayout {
        RegionLayout {
            index,
            origin_x: x,
            origin_y: y,
            width: 1000,
            height: 1000,
            scale,
        }
    }

    fn outcome(text: &str) -> DecodeOutcome {
        DecodeOutcome {
            symbol: DecodedSymbol {
                text: text.into(),
                format: Symbology::Code128,
            },
            variant: Variant::Grayscale,
            attempts: 1,
        }
    }

    #[test]
    fn full_scale_mapping_adds_origin() {
        let loc = page_location(&layout(4, 400, 320, 1.0), BoundingBox::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(loc, BoundingBox::new(410.0, 340.0, 30.0, 40.0));
    }

    #[test]
    fn half_resolution_mapping_divides_by_scale() {
        let loc = page_location(&layout(6, 0, 0, 0.5), BoundingBox::new(100.0, 50.0, 40.0, 10.0));
        assert_eq!(loc, BoundingBox::new(200.0, 100.0, 80.0, 20.0));
    }

    #[test]
    fn first_seen_content_wins() {
        let mut agg = ResultAggregator::new(2);
        let det_a = Detection::new(10.0, 10.0, 110.0, 40.0, 0.8);
        let det_b = Detection::new(50.0, 50.0, 150.0, 80.0, 0.95);

        assert!(agg.record(&layout(1, 0, 0, 1.0), &det_a, outcome("X")));
        assert!(!agg.record(&layout(5, 0, 0, 1.0), &det_b, outcome("X")));
        assert!(agg.record(&layout(5, 0, 0, 1.0), &det_b, outcome("Y")));
        assert_eq!(agg.len(), 2);

        let page = agg.finish();
        assert_eq!(page.page_number, 2);
        assert_eq!(page.region_number, Some(1));
        assert_eq!(page.barcodes[0].content, "X");
        assert_eq!(page.barcodes[0].confidence, 0.8);
        assert_eq!(page.barcodes[1].content, "Y");
    }

    #[test]
    fn empty_page_has_no_region_number() {
        let mut agg = ResultAggregator::new(1);
        agg.record_error(RegionError::DetectorTimeout {
            page: 1,
            region: 3,
            millis: 10,
        });
        assert!(agg.is_empty());
        let page = agg.finish();
        assert_eq!(page.region_number, None);
        assert_eq!(page.region_errors.len(), 1);
        assert!(page.barcodes.is_empty());
    }
}
