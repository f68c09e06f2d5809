//! Page orchestration: regions → detections → crop → cascade → aggregate.
//!
//! Everything within a page runs sequentially on the calling thread, apart
//! from detector and decoder calls that run under their deadline. Regions go
//! in index order and detections in the order the detector returned them, so
//! the same page always produces the same result.
//!
//! Failures stay local. A detector error or timeout skips that region and is
//! recorded on the page; a crop no variant can decode contributes nothing.

use crate::config::ScanConfig;
use crate::error::RegionError;
use crate::output::PageResult;
use crate::pipeline::aggregate::ResultAggregator;
use crate::pipeline::crop::crop_detection;
use crate::pipeline::deadline::{run_with_deadline, DeadlineError};
use crate::pipeline::decode::{decode_first, DecodeHints, SymbolDecoder};
use crate::pipeline::detect::{CandidateDetector, Detection};
use crate::pipeline::enhance::EnhancementCascade;
use crate::pipeline::load::Page;
use crate::pipeline::regions::{plan_regions, Region};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Scans single pages with a fixed configuration and capabilities.
///
/// Cheap to clone; all state is shared read-only.
#[derive(Clone)]
pub struct PagePipeline {
    config: Arc<ScanConfig>,
    detector: Arc<dyn CandidateDetector>,
    decoder: Arc<dyn SymbolDecoder>,
    hints: Arc<DecodeHints>,
}

impl PagePipeline {
    pub fn new(
        config: Arc<ScanConfig>,
        detector: Arc<dyn CandidateDetector>,
        decoder: Arc<dyn SymbolDecoder>,
    ) -> Self {
        let hints = Arc::new(DecodeHints::from(config.as_ref()));
        Self {
            config,
            detector,
            decoder,
            hints,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan one page. Always returns a result, empty when nothing decoded.
    #[instrument(skip_all, fields(page = page.number))]
    pub fn scan_page(&self, page: &Page) -> PageResult {
        let mut aggregator = ResultAggregator::new(page.number);
        let regions = plan_regions(
            &page.bitmap,
            self.config.overlap_ratio,
            self.config.half_resolution_pass,
        );

        for region in regions {
            let detections = match self.detect(&region, page.number) {
                Ok(d) => d,
                Err(e) => {
                    warn!("{}", e);
                    aggregator.record_error(e);
                    continue;
                }
            };
            debug!(
                "Region {}: {} detection(s)",
                region.index(),
                detections.len()
            );

            for detection in detections {
                self.process_detection(&region, &detection, &mut aggregator);
            }
        }

        let result = aggregator.finish();
        debug!(
            "Page {}: {} barcode(s), {} region error(s)",
            result.page_number,
            result.barcodes.len(),
            result.region_errors.len()
        );
        result
    }

    fn detect(&self, region: &Region, page: usize) -> Result<Vec<Detection>, RegionError> {
        let detector = Arc::clone(&self.detector);
        let bitmap = Arc::clone(&region.bitmap);
        let index = region.index();

        match run_with_deadline(self.config.detector_timeout, move || detector.detect(&bitmap)) {
            Ok(Ok(detections)) => Ok(detections),
            Ok(Err(e)) => Err(RegionError::DetectorFailure {
                page,
                region: index,
                detail: e.to_string(),
            }),
            Err(DeadlineError::TimedOut(limit)) => Err(RegionError::DetectorTimeout {
                page,
                region: index,
                millis: limit.as_millis() as u64,
            }),
            Err(other) => Err(RegionError::DetectorFailure {
                page,
                region: index,
                detail: other.to_string(),
            }),
        }
    }

    fn process_detection(
        &self,
        region: &Region,
        detection: &Detection,
        aggregator: &mut ResultAggregator,
    ) {
        if detection.confidence.is_nan() || detection.confidence < self.config.confidence_threshold {
            debug!(
                "Region {}: detection at {:.2} below threshold",
                region.index(),
                detection.confidence
            );
            return;
        }
        if !detection.is_finite() {
            debug!("Region {}: detection {:?} has non-finite corners", region.index(), detection);
            return;
        }

        let Some(crop) = crop_detection(&region.bitmap, detection, &self.config.crop) else {
            debug!("Region {}: detection {:?} has no area", region.index(), detection);
            return;
        };
        debug!(
            "Region {}: crop {}x{} at ({},{}), confidence {:.2}",
            region.index(),
            crop.rect.width,
            crop.rect.height,
            crop.rect.x,
            crop.rect.y,
            detection.confidence
        );

        let cascade = EnhancementCascade::new(&crop.bitmap, &self.config.enhance);
        drop(crop);

        match decode_first(cascade, &self.decoder, &self.hints, self.config.decode_timeout) {
            Some(outcome) => {
                aggregator.record(&region.layout, detection, outcome);
            }
            None => debug!("Region {}: no variant decoded", region.index()),
        }
    }
}
