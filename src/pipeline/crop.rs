//! Crop an accepted detection out of its region, with room to decode.
//!
//! Detector boxes hug the bars. Decoders need the quiet zone on both sides
//! of a linear symbol, so the box is padded on every side and, when the
//! result is not clearly wider than tall, widened further. Everything is
//! clipped to the region; a crop never reaches outside its bitmap.

use crate::config::CropSettings;
use crate::pipeline::detect::Detection;
use image::DynamicImage;

/// Integer rectangle inside a region bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A cropped candidate and where it came from.
#[derive(Debug, Clone)]
pub struct Crop {
    pub rect: CropRect,
    pub bitmap: DynamicImage,
}

/// Compute the crop rectangle for `detection` inside a `region_w × region_h`
/// bitmap. Returns `None` when the box has no area once clipped.
pub fn crop_rect(
    detection: &Detection,
    region_w: u32,
    region_h: u32,
    settings: &CropSettings,
) -> Option<CropRect> {
    let clamp_x = |v: f32| v.clamp(0.0, region_w as f32);
    let clamp_y = |v: f32| v.clamp(0.0, region_h as f32);

    let x1 = clamp_x(detection.x1.min(detection.x2)).floor() as u32;
    let y1 = clamp_y(detection.y1.min(detection.y2)).floor() as u32;
    let x2 = clamp_x(detection.x1.max(detection.x2)).ceil() as u32;
    let y2 = clamp_y(detection.y1.max(detection.y2)).ceil() as u32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let box_w = x2 - x1;
    let box_h = y2 - y1;
    let padding = settings.fixed_padding.max(box_w.min(box_h) / 10);

    let mut left = x1.saturating_sub(padding);
    let top = y1.saturating_sub(padding);
    let mut right = (x2 + padding).min(region_w);
    let bottom = (y2 + padding).min(region_h);

    let height = bottom - top;
    let width = right - left;
    if (width as f32) < settings.min_aspect_ratio * height as f32 {
        let target = (height as f32 * settings.target_aspect_ratio).round() as u32;
        let extra = target.saturating_sub(width);
        left = left.saturating_sub(extra / 2);
        right = (right + (extra - extra / 2)).min(region_w);
    }

    Some(CropRect {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}

/// Cut the padded, aspect-corrected crop for `detection` out of `region`.
pub fn crop_detection(
    region: &DynamicImage,
    detection: &Detection,
    settings: &CropSettings,
) -> Option<Crop> {
    let rect = crop_rect(detection, region.width(), region.height(), settings)?;
    let bitmap = region.crop_imm(rect.x, rect.y, rect.width, rect.height);
    Some(Crop { rect, bitmap })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn rect(d: Detection, w: u32, h: u32) -> Option<CropRect> {
        crop_rect(&d, w, h, &CropSettings::default())
    }

    #[test]
    fn wide_box_gets_fixed_padding_only() {
        // 200×40 box: min side / 10 = 4 < 15, aspect already > 2
        let r = rect(Detection::new(100.0, 100.0, 300.0, 140.0, 0.9), 1000, 1000).unwrap();
        assert_eq!(r, CropRect { x: 85, y: 85, width: 230, height: 70 });
    }

    #[test]
    fn large_box_pads_by_a_tenth() {
        // 700×300 box: min side / 10 = 30
        let r = rect(Detection::new(150.0, 200.0, 850.0, 500.0, 0.9), 1000, 1000).unwrap();
        assert_eq!((r.x, r.y), (120, 170));
        assert_eq!((r.width, r.height), (760, 360));
    }

    #[test]
    fn square_box_is_widened_not_heightened() {
        // 100×100 box + 15 padding → 130×130, widened to 325
        let r = rect(Detection::new(400.0, 400.0, 500.0, 500.0, 0.9), 1000, 1000).unwrap();
        assert_eq!(r.height, 130);
        assert_eq!(r.width, 325);
        assert_eq!(r.y, 385);
        // 195 extra: 97 left, 98 right
        assert_eq!(r.x, 385 - 97);
    }

    #[test]
    fn crop_is_clipped_to_region() {
        let r = rect(Detection::new(-20.0, 5.0, 30.0, 95.0, 0.9), 100, 100).unwrap();
        assert_eq!(r.x, 0);
        assert_eq!(r.y, 0);
        assert!(r.x + r.width <= 100);
        assert!(r.y + r.height <= 100);
    }

    #[test]
    fn box_outside_region_yields_nothing() {
        assert_eq!(rect(Detection::new(150.0, 10.0, 180.0, 20.0, 0.9), 100, 100), None);
        assert_eq!(rect(Detection::new(10.0, 10.0, 10.0, 50.0, 0.9), 100, 100), None);
    }

    #[test]
    fn crop_copies_pixels() {
        let mut img = GrayImage::from_pixel(300, 300, Luma([255]));
        img.put_pixel(150, 150, Luma([0]));
        let region = DynamicImage::ImageLuma8(img);
        let crop = crop_detection(
            &region,
            &Detection::new(100.0, 140.0, 200.0, 160.0, 0.5),
            &CropSettings::default(),
        )
        .unwrap();
        let local = crop.bitmap.to_luma8();
        assert_eq!(
            local.get_pixel(150 - crop.rect.x, 150 - crop.rect.y).0,
            [0]
        );
    }
}
