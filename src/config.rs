//! Configuration types for barcode scanning.
//!
//! All scanning behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. The configuration is read-only once the scanner is
//! constructed, so it can be shared by every page and region task without
//! locking.
//!
//! # Design choice: builder over constructor
//! The pipeline has a dozen tunables whose defaults are right for almost every
//! scan. The builder lets callers set only what they care about and validates
//! the combination once in [`ScanConfigBuilder::build`].

use crate::error::ScanError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a barcode scan.
///
/// # Example
/// ```rust
/// use barscan::{ScanConfig, Symbology};
///
/// let config = ScanConfig::builder()
///     .confidence_threshold(0.3)
///     .symbologies([Symbology::Ean13, Symbology::QrCode])
///     .build()
///     .unwrap();
/// assert_eq!(config.symbologies.len(), 2);
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Minimum detector confidence for a detection to be cropped. Default: 0.25.
    ///
    /// Deliberately low: a false candidate costs at most nine cheap decode
    /// attempts, while a missed barcode is lost for good.
    pub confidence_threshold: f32,

    /// Non-max-suppression IoU threshold handed to detector implementations.
    /// Default: 0.6. NMS itself runs inside the detector.
    pub nms_threshold: f32,

    /// Fraction of a quadrant's size added on its inward edges. Default: 0.2.
    pub overlap_ratio: f32,

    /// Emit the half-resolution whole-page region (region 6). Default: true.
    pub half_resolution_pass: bool,

    /// Crop geometry applied to accepted detections.
    pub crop: CropSettings,

    /// Parameters of the enhancement cascade.
    pub enhance: EnhanceSettings,

    /// Symbologies the decoder may report. Default: the common 1-D retail and
    /// logistics codes plus QR.
    pub symbologies: BTreeSet<Symbology>,

    /// Ask the decoder to spend more time per attempt. Default: true.
    pub try_harder: bool,

    /// Tell the decoder the bitmap contains only the symbol. Default: true.
    pub pure_barcode: bool,

    /// PDF rasterisation DPI. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Cap on the longest rendered PDF page edge in pixels. Default: 6000.
    ///
    /// An A0 drawing at 300 DPI would otherwise allocate a 10 000 × 14 000
    /// bitmap per page.
    pub max_rendered_pixels: u32,

    /// Page selection for multi-page documents. Default: all pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Number of pages scanned in parallel. Default: 1.
    pub concurrency: usize,

    /// Deadline for a single detector call. `None` waits forever. Default: 30 s.
    pub detector_timeout: Option<Duration>,

    /// Deadline for a single decode attempt. `None` waits forever. Default: 5 s.
    pub decode_timeout: Option<Duration>,

    /// How the pdfium shared library is located. Bound once per scanner.
    pub pdfium: PdfiumLibrary,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            nms_threshold: 0.6,
            overlap_ratio: 0.2,
            half_resolution_pass: true,
            crop: CropSettings::default(),
            enhance: EnhanceSettings::default(),
            symbologies: Symbology::default_set(),
            try_harder: true,
            pure_barcode: true,
            dpi: 300,
            max_rendered_pixels: 6000,
            pages: PageSelection::default(),
            password: None,
            concurrency: 1,
            detector_timeout: Some(Duration::from_secs(30)),
            decode_timeout: Some(Duration::from_secs(5)),
            pdfium: PdfiumLibrary::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("confidence_threshold", &self.confidence_threshold)
            .field("nms_threshold", &self.nms_threshold)
            .field("overlap_ratio", &self.overlap_ratio)
            .field("half_resolution_pass", &self.half_resolution_pass)
            .field("crop", &self.crop)
            .field("enhance", &self.enhance)
            .field("symbologies", &self.symbologies)
            .field("dpi", &self.dpi)
            .field("pages", &self.pages)
            .field("concurrency", &self.concurrency)
            .field("detector_timeout", &self.detector_timeout)
            .field("decode_timeout", &self.decode_timeout)
            .field("pdfium", &self.pdfium)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn confidence_threshold(mut self, t: f32) -> Self {
        self.config.confidence_threshold = t;
        self
    }

    pub fn nms_threshold(mut self, t: f32) -> Self {
        self.config.nms_threshold = t;
        self
    }

    pub fn overlap_ratio(mut self, r: f32) -> Self {
        self.config.overlap_ratio = r;
        self
    }

    pub fn half_resolution_pass(mut self, v: bool) -> Self {
        self.config.half_resolution_pass = v;
        self
    }

    pub fn crop(mut self, crop: CropSettings) -> Self {
        self.config.crop = crop;
        self
    }

    pub fn enhance(mut self, enhance: EnhanceSettings) -> Self {
        self.config.enhance = enhance;
        self
    }

    pub fn symbologies(mut self, formats: impl IntoIterator<Item = Symbology>) -> Self {
        self.config.symbologies = formats.into_iter().collect();
        self
    }

    pub fn try_harder(mut self, v: bool) -> Self {
        self.config.try_harder = v;
        self
    }

    pub fn pure_barcode(mut self, v: bool) -> Self {
        self.config.pure_barcode = v;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn detector_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.detector_timeout = timeout;
        self
    }

    pub fn decode_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.decode_timeout = timeout;
        self
    }

    pub fn pdfium(mut self, library: PdfiumLibrary) -> Self {
        self.config.pdfium = library;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.confidence_threshold) {
            return Err(ScanError::InvalidConfig(format!(
                "confidence threshold must be 0–1, got {}",
                c.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&c.nms_threshold) {
            return Err(ScanError::InvalidConfig(format!(
                "NMS threshold must be 0–1, got {}",
                c.nms_threshold
            )));
        }
        if !(0.0..0.5).contains(&c.overlap_ratio) {
            return Err(ScanError::InvalidConfig(format!(
                "overlap ratio must be in [0, 0.5), got {}",
                c.overlap_ratio
            )));
        }
        if c.symbologies.is_empty() {
            return Err(ScanError::InvalidConfig(
                "at least one symbology must be enabled".into(),
            ));
        }
        c.crop.validate()?;
        c.enhance.validate()?;
        Ok(self.config)
    }
}

/// Crop geometry applied around an accepted detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSettings {
    /// Minimum padding on every side, in region pixels. Default: 15.
    pub fixed_padding: u32,
    /// Crops narrower than `width / height < min_aspect_ratio` get widened. Default: 2.0.
    pub min_aspect_ratio: f32,
    /// Width/height ratio a narrow crop is widened to. Default: 2.5.
    pub target_aspect_ratio: f32,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            fixed_padding: 15,
            min_aspect_ratio: 2.0,
            target_aspect_ratio: 2.5,
        }
    }
}

impl CropSettings {
    fn validate(&self) -> Result<(), ScanError> {
        if self.min_aspect_ratio <= 0.0 || self.target_aspect_ratio < self.min_aspect_ratio {
            return Err(ScanError::InvalidConfig(format!(
                "crop aspect ratios must satisfy 0 < min ({}) <= target ({})",
                self.min_aspect_ratio, self.target_aspect_ratio
            )));
        }
        Ok(())
    }
}

/// Parameters of the enhancement cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceSettings {
    /// Brightness offset (grey levels) scaled by each multiplier before Otsu. Default: 10.
    pub brightness_offset: f32,
    /// Multipliers of `brightness_offset`, one Otsu variant each. Default: 0.8, 1.0, 1.2.
    pub brightness_multipliers: Vec<f32>,
    /// Neighbourhood sizes of the Gaussian adaptive thresholds. Default: 11, 15, 21.
    pub adaptive_block_sizes: Vec<u32>,
    /// Constant subtracted from the weighted local mean. Default: 2.
    pub adaptive_constant: i32,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            brightness_offset: 10.0,
            brightness_multipliers: vec![0.8, 1.0, 1.2],
            adaptive_block_sizes: vec![11, 15, 21],
            adaptive_constant: 2,
        }
    }
}

impl EnhanceSettings {
    fn validate(&self) -> Result<(), ScanError> {
        if let Some(bad) = self
            .adaptive_block_sizes
            .iter()
            .find(|&&b| b < 3 || b % 2 == 0)
        {
            return Err(ScanError::InvalidConfig(format!(
                "adaptive block sizes must be odd and >= 3, got {bad}"
            )));
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Barcode symbologies the pipeline knows how to request from a decoder.
///
/// Serialised with the upper-case names decoders conventionally report
/// (`EAN_13`, `QR_CODE`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "CODABAR")]
    Codabar,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "ITF")]
    Itf,
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "DATA_MATRIX")]
    DataMatrix,
    #[serde(rename = "PDF_417")]
    Pdf417,
    #[serde(rename = "AZTEC")]
    Aztec,
}

impl Symbology {
    pub const ALL: [Symbology; 13] = [
        Symbology::Code128,
        Symbology::Code39,
        Symbology::Code93,
        Symbology::Codabar,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Itf,
        Symbology::QrCode,
        Symbology::DataMatrix,
        Symbology::Pdf417,
        Symbology::Aztec,
    ];

    /// The default allow-list.
    pub fn default_set() -> BTreeSet<Symbology> {
        [
            Symbology::Code128,
            Symbology::Code39,
            Symbology::Ean13,
            Symbology::Ean8,
            Symbology::UpcA,
            Symbology::UpcE,
            Symbology::Itf,
            Symbology::QrCode,
        ]
        .into_iter()
        .collect()
    }

    /// Canonical upper-case name, e.g. `"EAN_13"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Symbology::Code128 => "CODE_128",
            Symbology::Code39 => "CODE_39",
            Symbology::Code93 => "CODE_93",
            Symbology::Codabar => "CODABAR",
            Symbology::Ean13 => "EAN_13",
            Symbology::Ean8 => "EAN_8",
            Symbology::UpcA => "UPC_A",
            Symbology::UpcE => "UPC_E",
            Symbology::Itf => "ITF",
            Symbology::QrCode => "QR_CODE",
            Symbology::DataMatrix => "DATA_MATRIX",
            Symbology::Pdf417 => "PDF_417",
            Symbology::Aztec => "AZTEC",
        }
    }

    /// True for linear (1-D) symbologies.
    pub fn is_linear(self) -> bool {
        !matches!(
            self,
            Symbology::QrCode | Symbology::DataMatrix | Symbology::Pdf417 | Symbology::Aztec
        )
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Symbology {
    type Err = ScanError;

    /// Accepts `EAN_13`, `ean13`, `ean-13`, …
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        Symbology::ALL
            .into_iter()
            .find(|sym| sym.as_str().replace('_', "") == wanted)
            .ok_or_else(|| ScanError::InvalidConfig(format!("unknown symbology '{s}'")))
    }
}

/// How the pdfium shared library is located.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PdfiumLibrary {
    /// Search the system library path (default).
    #[default]
    System,
    /// Load the library from an explicit file path.
    Path(PathBuf),
}

/// Specifies which pages of a multi-page document to scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Scan all pages (default).
    #[default]
    All,
    /// Scan a single page (1-indexed).
    Single(usize),
    /// Scan a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Scan specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// First requested page number, used when reporting an empty selection.
    pub fn first_requested(&self) -> usize {
        match self {
            PageSelection::All => 1,
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ScanConfig::default();
        assert_eq!(c.confidence_threshold, 0.25);
        assert_eq!(c.overlap_ratio, 0.2);
        assert_eq!(c.crop.fixed_padding, 15);
        assert_eq!(c.enhance.adaptive_block_sizes, vec![11, 15, 21]);
        assert!(c.symbologies.contains(&Symbology::Ean13));
        assert!(!c.symbologies.contains(&Symbology::Aztec));
    }

    #[test]
    fn builder_rejects_out_of_range_confidence() {
        let err = ScanConfig::builder()
            .confidence_threshold(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_even_block_size() {
        let enhance = EnhanceSettings {
            adaptive_block_sizes: vec![11, 14],
            ..Default::default()
        };
        let err = ScanConfig::builder().enhance(enhance).build().unwrap_err();
        assert!(err.to_string().contains("14"));
    }

    #[test]
    fn builder_rejects_empty_symbologies() {
        let err = ScanConfig::builder()
            .symbologies(Vec::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[test]
    fn dpi_is_clamped() {
        let c = ScanConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
    }

    #[test]
    fn symbology_parses_loose_spellings() {
        assert_eq!("EAN_13".parse::<Symbology>().unwrap(), Symbology::Ean13);
        assert_eq!("ean13".parse::<Symbology>().unwrap(), Symbology::Ean13);
        assert_eq!("qr-code".parse::<Symbology>().unwrap(), Symbology::QrCode);
        assert!("morse".parse::<Symbology>().is_err());
    }

    #[test]
    fn symbology_serialises_upper_snake() {
        let json = serde_json::to_string(&Symbology::Code128).unwrap();
        assert_eq!(json, "\"CODE_128\"");
        assert!(Symbology::Code128.is_linear());
        assert!(!Symbology::QrCode.is_linear());
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }
}
