//! Enhancement cascade: the fixed sequence of bitmap variants tried against
//! the decoder for one crop.
//!
//! ## Order
//!
//! | # | Variant | Operation |
//! |---|---------|-----------|
//! | 1 | `Grayscale` | luma conversion only |
//! | 2–4 | `Otsu { brightness }` | brighten by 0.8/1.0/1.2 × offset, then Otsu |
//! | 5–7 | `AdaptiveGaussian { block_size }` | Gaussian-weighted local mean − C, blocks 11/15/21 |
//! | 8 | `SharpenOtsu` | 3×3 sharpen (centre 9, neighbours −1), then Otsu |
//! | 9 | `StretchOtsu` | min–max contrast stretch, then Otsu |
//!
//! Cheap variants come first. The cascade is an iterator: a variant is only
//! computed when the decoder asks for it, so a crop that decodes on the plain
//! grayscale never pays for the eight binarisations after it.

use crate::config::EnhanceSettings;
use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::separable_filter_equal;
use std::fmt;

/// One step of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// Plain luma conversion.
    #[default]
    Grayscale,
    /// Global Otsu threshold after adding `brightness` grey levels.
    Otsu { brightness: i32 },
    /// Gaussian-weighted adaptive threshold over a `block_size` neighbourhood.
    AdaptiveGaussian { block_size: u32 },
    /// 3×3 sharpen followed by Otsu.
    SharpenOtsu,
    /// Linear min–max stretch followed by Otsu.
    StretchOtsu,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Grayscale => write!(f, "grayscale"),
            Variant::Otsu { brightness } => write!(f, "otsu(+{brightness})"),
            Variant::AdaptiveGaussian { block_size } => write!(f, "adaptive-gaussian({block_size})"),
            Variant::SharpenOtsu => write!(f, "sharpen+otsu"),
            Variant::StretchOtsu => write!(f, "stretch+otsu"),
        }
    }
}

/// The variants to try, in order, for the given settings.
pub fn plan(settings: &EnhanceSettings) -> Vec<Variant> {
    let mut variants = Vec::with_capacity(
        3 + settings.brightness_multipliers.len() + settings.adaptive_block_sizes.len(),
    );
    variants.push(Variant::Grayscale);
    variants.extend(settings.brightness_multipliers.iter().map(|m| Variant::Otsu {
        brightness: (settings.brightness_offset * m).round() as i32,
    }));
    variants.extend(
        settings
            .adaptive_block_sizes
            .iter()
            .map(|&block_size| Variant::AdaptiveGaussian { block_size }),
    );
    variants.push(Variant::SharpenOtsu);
    variants.push(Variant::StretchOtsu);
    variants
}

/// Lazily yields `(variant, bitmap)` pairs for one crop.
pub struct EnhancementCascade {
    gray: GrayImage,
    adaptive_constant: i32,
    pending: std::vec::IntoIter<Variant>,
}

impl EnhancementCascade {
    /// Start a cascade over `crop`, converting it to grayscale once.
    pub fn new(crop: &DynamicImage, settings: &EnhanceSettings) -> Self {
        Self {
            gray: crop.to_luma8(),
            adaptive_constant: settings.adaptive_constant,
            pending: plan(settings).into_iter(),
        }
    }

    /// Produce the bitmap for one variant of this cascade's crop.
    pub fn render(&self, variant: Variant) -> GrayImage {
        match variant {
            Variant::Grayscale => self.gray.clone(),
            Variant::Otsu { brightness } => otsu(&imageops::brighten(&self.gray, brightness)),
            Variant::AdaptiveGaussian { block_size } => {
                adaptive_gaussian(&self.gray, block_size, self.adaptive_constant)
            }
            Variant::SharpenOtsu => otsu(&sharpen(&self.gray)),
            Variant::StretchOtsu => otsu(&stretch(&self.gray)),
        }
    }
}

impl Iterator for EnhancementCascade {
    type Item = (Variant, GrayImage);

    fn next(&mut self) -> Option<Self::Item> {
        let variant = self.pending.next()?;
        Some((variant, self.render(variant)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

// ── Operations ───────────────────────────────────────────────────────────

fn otsu(gray: &GrayImage) -> GrayImage {
    threshold(gray, otsu_level(gray), ThresholdType::Binary)
}

/// Sigma used for a Gaussian kernel of `size` taps when none is given.
fn gaussian_sigma(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = gaussian_sigma(size);
    let half = (size / 2) as i32;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// White where the pixel is brighter than its Gaussian-weighted
/// neighbourhood mean minus `c`, black elsewhere.
fn adaptive_gaussian(gray: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let mean = separable_filter_equal(gray, &gaussian_kernel(block_size));
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0] as i32;
        let m = mean.get_pixel(x, y)[0] as i32;
        Luma([if p > m - c { 255 } else { 0 }])
    })
}

/// 3×3 sharpen: `9·p − Σ neighbours`, edges replicated, clamped to 0..=255.
fn sharpen(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let at = |x: i64, y: i64| -> i32 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        gray.get_pixel(cx, cy)[0] as i32
    };
    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let mut acc = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let weight = if dx == 0 && dy == 0 { 9 } else { -1 };
                acc += weight * at(x + dx, y + dy);
            }
        }
        Luma([acc.clamp(0, 255) as u8])
    })
}

/// Linearly map the darkest pixel to 0 and the brightest to 255.
/// A flat image is returned unchanged.
fn stretch(gray: &GrayImage) -> GrayImage {
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if hi <= lo {
        return gray.clone();
    }
    let range = (hi - lo) as f32;
    let lut: Vec<u8> = (0..=255u16)
        .map(|v| {
            let v = (v as u8).clamp(lo, hi);
            (((v - lo) as f32 / range) * 255.0).round() as u8
        })
        .collect();
    let mut out = gray.clone();
    out.pixels_mut().for_each(|p| p[0] = lut[p[0] as usize]);
    out
}
