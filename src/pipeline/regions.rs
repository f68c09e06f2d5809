//! Region planning: cut one page into the six regions the detector sees.
//!
//! ## Why six regions?
//!
//! Detectors resize their input to a fixed square (typically 640 px). On a
//! 300 DPI A4 scan a retail barcode then shrinks to a few pixels and is
//! missed. Splitting the page into quadrants roughly doubles the barcode's
//! relative size; overlapping the quadrants by a fraction of their size keeps
//! a barcode lying on a seam whole in at least one of them. The full page
//! catches symbols larger than a quadrant, and a half-resolution copy of the
//! page gives the detector one more scale to work with.
//!
//! | index | region | scale |
//! |-------|--------|-------|
//! | 1 | top-left quadrant | 1.0 |
//! | 2 | top-right quadrant | 1.0 |
//! | 3 | bottom-left quadrant | 1.0 |
//! | 4 | bottom-right quadrant | 1.0 |
//! | 5 | full page | 1.0 |
//! | 6 | full page, half resolution | 0.5 |

use image::imageops::FilterType;
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

/// Scale factor of the half-resolution region.
pub const HALF_RESOLUTION_SCALE: f32 = 0.5;

/// Position of a region within its page, in page pixel coordinates.
///
/// For the half-resolution region `width`/`height` describe the page area
/// covered (the whole page); its bitmap is `scale` times that size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionLayout {
    /// Fixed sequence index, 1–6.
    pub index: usize,
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

/// A region ready for detection: its layout plus an independent bitmap copy.
#[derive(Debug, Clone)]
pub struct Region {
    pub layout: RegionLayout,
    /// Shared so a detector running under a deadline can hold it.
    pub bitmap: Arc<DynamicImage>,
}

impl Region {
    pub fn index(&self) -> usize {
        self.layout.index
    }

    /// Width of the region bitmap (differs from the layout width when scaled).
    pub fn bitmap_width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn bitmap_height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Compute the region layouts for a `width × height` page.
///
/// Quadrants grow on their inward edges by `overlap_ratio` of the quadrant
/// size and are clipped to the page. The right and bottom quadrants always
/// reach the page edge, so odd page sizes lose no column or row. Quadrants
/// with no area (pages narrower or shorter than 2 px) are left out; the
/// remaining regions keep their fixed index.
pub fn plan_layout(
    width: u32,
    height: u32,
    overlap_ratio: f32,
    half_resolution: bool,
) -> Vec<RegionLayout> {
    let base_w = width / 2;
    let base_h = height / 2;
    let overlap_x = (base_w as f32 * overlap_ratio) as u32;
    let overlap_y = (base_h as f32 * overlap_ratio) as u32;

    // (start, extent) along one axis for the near and far half.
    let span = |base: u32, overlap: u32, total: u32, far: bool| -> (u32, u32) {
        if far {
            let start = base.saturating_sub(overlap);
            (start, total - start)
        } else {
            (0, (base + overlap).min(total))
        }
    };

    let mut layouts = Vec::with_capacity(6);
    let mut index = 1;
    for row in [false, true] {
        for col in [false, true] {
            let (x, w) = span(base_w, overlap_x, width, col);
            let (y, h) = span(base_h, overlap_y, height, row);
            if w > 0 && h > 0 {
                layouts.push(RegionLayout {
                    index,
                    origin_x: x,
                    origin_y: y,
                    width: w,
                    height: h,
                    scale: 1.0,
                });
            }
            index += 1;
        }
    }

    if width > 0 && height > 0 {
        layouts.push(RegionLayout {
            index: 5,
            origin_x: 0,
            origin_y: 0,
            width,
            height,
            scale: 1.0,
        });
        if half_resolution {
            layouts.push(RegionLayout {
                index: 6,
                origin_x: 0,
                origin_y: 0,
                width,
                height,
                scale: HALF_RESOLUTION_SCALE,
            });
        }
    }

    layouts
}

/// Lazily materialise the regions of `page`, in index order.
///
/// Each bitmap is produced only when the iterator is advanced, so at most one
/// region copy is alive at a time while the page orchestrator works through
/// them.
pub fn plan_regions(
    page: &DynamicImage,
    overlap_ratio: f32,
    half_resolution: bool,
) -> impl Iterator<Item = Region> + '_ {
    plan_layout(page.width(), page.height(), overlap_ratio, half_resolution)
        .into_iter()
        .map(move |layout| {
            let bitmap = if layout.scale == 1.0 {
                page.crop_imm(layout.origin_x, layout.origin_y, layout.width, layout.height)
            } else {
                let w = ((layout.width as f32 * layout.scale) as u32).max(1);
                let h = ((layout.height as f32 * layout.scale) as u32).max(1);
                page.resize_exact(w, h, FilterType::Triangle)
            };
            debug!(
                "Region {}: {}x{} at ({},{}) scale {}",
                layout.index,
                bitmap.width(),
                bitmap.height(),
                layout.origin_x,
                layout.origin_y,
                layout.scale
            );
            Region {
                layout,
                bitmap: Arc::new(bitmap),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn layout_has_six_regions_in_fixed_order() {
        let layouts = plan_layout(1000, 800, 0.2, true);
        let indices: Vec<usize> = layouts.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn quadrants_overlap_on_inward_edges() {
        let layouts = plan_layout(1000, 800, 0.2, true);
        // base 500×400, overlap 100×80
        assert_eq!((layouts[0].origin_x, layouts[0].origin_y), (0, 0));
        assert_eq!((layouts[0].width, layouts[0].height), (600, 480));
        assert_eq!((layouts[1].origin_x, layouts[1].origin_y), (400, 0));
        assert_eq!((layouts[1].width, layouts[1].height), (600, 480));
        assert_eq!((layouts[2].origin_x, layouts[2].origin_y), (0, 320));
        assert_eq!((layouts[3].origin_x, layouts[3].origin_y), (400, 320));
        assert_eq!((layouts[3].width, layouts[3].height), (600, 480));
    }

    #[test]
    fn regions_stay_within_page_bounds() {
        for (w, h) in [(1001, 777), (3, 3), (2480, 3508), (640, 1)] {
            for l in plan_layout(w, h, 0.2, true) {
                assert!(l.origin_x + l.width <= w, "{l:?} exceeds width {w}");
                assert!(l.origin_y + l.height <= h, "{l:?} exceeds height {h}");
            }
        }
    }

    #[test]
    fn odd_sizes_cover_last_column() {
        let layouts = plan_layout(1001, 1001, 0.2, false);
        let right = layouts.iter().find(|l| l.index == 2).unwrap();
        assert_eq!(right.origin_x + right.width, 1001);
        assert_eq!(layouts.len(), 5);
    }

    #[test]
    fn degenerate_page_skips_empty_quadrants() {
        let layouts = plan_layout(1, 50, 0.2, true);
        let indices: Vec<usize> = layouts.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![2, 4, 5, 6]);
    }

    #[test]
    fn materialised_regions_are_independent_copies() {
        let mut img = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        img.put_pixel(150, 80, Rgb([0, 0, 0]));
        let page = DynamicImage::ImageRgb8(img);

        let regions: Vec<Region> = plan_regions(&page, 0.2, true).collect();
        assert_eq!(regions.len(), 6);

        let bottom_right = &regions[3];
        assert_eq!(bottom_right.layout.origin_x, 80);
        assert_eq!(bottom_right.layout.origin_y, 40);
        let px = bottom_right.bitmap.to_rgb8().get_pixel(150 - 80, 80 - 40).0;
        assert_eq!(px, [0, 0, 0]);

        let half = &regions[5];
        assert_eq!((half.bitmap_width(), half.bitmap_height()), (100, 50));
        assert_eq!((half.layout.width, half.layout.height), (200, 100));
        assert_eq!(half.layout.scale, 0.5);
    }
}
