//! Candidate detection contract.
//!
//! The pipeline never runs inference itself. A [`CandidateDetector`] is
//! injected into the scanner and called once per region; it returns boxes in
//! the region bitmap's own pixel coordinates. Confidence filtering happens in
//! the page orchestrator. Non-max suppression is the detector's job.

use crate::error::DetectorError;
use crate::output::BoundingBox;
use image::DynamicImage;

/// One box reported by a detector, in region pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_label: String,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_label: "barcode".into(),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).abs()
    }

    /// True when all four corners are finite numbers.
    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }

    /// The box as `x, y, width, height` in region coordinates.
    ///
    /// Corners may arrive in either order; the top-left is taken as the
    /// per-axis minimum, matching how the crop stage reads them.
    pub fn region_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x1.min(self.x2),
            self.y1.min(self.y2),
            self.width(),
            self.height(),
        )
    }
}

/// Locates barcode-like areas in a bitmap.
///
/// Implementations must be free of side effects and safe to call from
/// several page tasks at once. A call may be slow (model inference), which is
/// why the scanner bounds it with `ScanConfig::detector_timeout`.
pub trait CandidateDetector: Send + Sync {
    fn detect(&self, bitmap: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;
}

/// Reports the whole bitmap as a single candidate.
///
/// Lets the pipeline run without a trained detector: every region is handed
/// to the crop/enhance/decode stages as is. Useful for documents that hold
/// one symbol per region and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFrameDetector;

impl CandidateDetector for FullFrameDetector {
    fn detect(&self, bitmap: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Detection::new(
            0.0,
            0.0,
            bitmap.width() as f32,
            bitmap.height() as f32,
            1.0,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn full_frame_covers_bitmap() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(120, 40));
        let found = FullFrameDetector.detect(&img).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].region_box(), BoundingBox::new(0.0, 0.0, 120.0, 40.0));
        assert_eq!(found[0].confidence, 1.0);
        assert_eq!(found[0].class_label, "barcode");
    }

    #[test]
    fn inverted_box_is_normalised() {
        let d = Detection::new(150.0, 60.0, 50.0, 20.0, 0.9);
        assert_eq!(d.width(), 100.0);
        assert_eq!(d.height(), 40.0);
        assert_eq!(d.region_box(), BoundingBox::new(50.0, 20.0, 100.0, 40.0));
    }

    #[test]
    fn non_finite_corners_are_flagged() {
        assert!(Detection::new(0.0, 0.0, 10.0, 10.0, 0.5).is_finite());
        assert!(!Detection::new(f32::INFINITY, 0.0, f32::NEG_INFINITY, 10.0, 0.9).is_finite());
        assert!(!Detection::new(0.0, f32::NAN, 10.0, 10.0, 0.9).is_finite());
    }
}
