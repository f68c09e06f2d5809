//! Document loading: turn raw bytes into an ordered list of page bitmaps.
//!
//! ## Supported formats
//!
//! | Format | Backend | Pages |
//! |--------|---------|-------|
//! | PDF | pdfium, rasterised at `dpi` | every page |
//! | TIFF | `tiff` crate | every IFD |
//! | PNG, JPEG, BMP, GIF, WebP | `image` | one |
//!
//! `image` only ever decodes the first IFD of a TIFF, which silently drops
//! pages 2..n of a scanner's multi-page output. TIFF therefore goes through
//! the `tiff` decoder directly.
//!
//! ## Why bind pdfium per load?
//!
//! A `Pdfium` handle is not `Send`, so it cannot be created up front and
//! shared with the blocking pool. The library location comes from
//! [`PdfiumLibrary`] and is bound inside the blocking task that uses it.

use crate::config::{PageSelection, PdfiumLibrary, ScanConfig};
use crate::error::ScanError;
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage, RgbaImage};
use pdfium_render::prelude::*;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder as TiffDecoder, DecodingResult};
use tiff::ColorType as TiffColor;
use tracing::{debug, info};

/// One page of a loaded document.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-indexed position in the source document.
    pub number: usize,
    pub bitmap: DynamicImage,
}

// ── Content types ────────────────────────────────────────────────────────

/// Document formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Pdf,
    Tiff,
    Png,
    Jpeg,
    Bmp,
    Gif,
    WebP,
}

impl ContentType {
    /// Parse a MIME type. Parameters (`; charset=…`) and case are ignored.
    pub fn from_mime(mime: &str) -> Result<Self, ScanError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" | "application/x-pdf" => Ok(ContentType::Pdf),
            "image/tiff" | "image/tif" | "image/x-tiff" => Ok(ContentType::Tiff),
            "image/png" => Ok(ContentType::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok(ContentType::Jpeg),
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Ok(ContentType::Bmp),
            "image/gif" => Ok(ContentType::Gif),
            "image/webp" => Ok(ContentType::WebP),
            _ => Err(ScanError::UnsupportedFormat {
                content_type: mime.to_string(),
            }),
        }
    }

    /// Guess from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(ContentType::Pdf),
            "tif" | "tiff" => Some(ContentType::Tiff),
            "png" => Some(ContentType::Png),
            "jpg" | "jpeg" | "jpe" => Some(ContentType::Jpeg),
            "bmp" => Some(ContentType::Bmp),
            "gif" => Some(ContentType::Gif),
            "webp" => Some(ContentType::WebP),
            _ => None,
        }
    }

    /// Identify the format from its magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        // PDF headers may be preceded by junk; readers accept it within 1 KiB.
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(5).any(|w| w == b"%PDF-") {
            return Some(ContentType::Pdf);
        }
        match bytes {
            [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some(ContentType::Tiff),
            // BigTIFF
            [0x49, 0x49, 0x2B, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2B, ..] => Some(ContentType::Tiff),
            [0x89, b'P', b'N', b'G', ..] => Some(ContentType::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(ContentType::Jpeg),
            [b'B', b'M', ..] => Some(ContentType::Bmp),
            [b'G', b'I', b'F', b'8', ..] => Some(ContentType::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ContentType::WebP),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Pdf => "application/pdf",
            ContentType::Tiff => "image/tiff",
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Bmp => "image/bmp",
            ContentType::Gif => "image/gif",
            ContentType::WebP => "image/webp",
        }
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            ContentType::Png => Some(ImageFormat::Png),
            ContentType::Jpeg => Some(ImageFormat::Jpeg),
            ContentType::Bmp => Some(ImageFormat::Bmp),
            ContentType::Gif => Some(ImageFormat::Gif),
            ContentType::WebP => Some(ImageFormat::WebP),
            ContentType::Pdf | ContentType::Tiff => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl std::str::FromStr for ContentType {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::from_mime(s)
    }
}

// ── Options ──────────────────────────────────────────────────────────────

/// The subset of [`ScanConfig`] the loader needs.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub pages: PageSelection,
    pub password: Option<String>,
    pub pdfium: PdfiumLibrary,
}

impl From<&ScanConfig> for LoadOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            pages: config.pages.clone(),
            password: config.password.clone(),
            pdfium: config.pdfium.clone(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

/// Decode `bytes` into the selected pages, in document order.
///
/// Blocking: PDF rasterisation and TIFF decoding are CPU-bound. Async
/// callers go through [`load_pages_async`].
pub fn load_pages(
    bytes: &[u8],
    content_type: ContentType,
    opts: &LoadOptions,
) -> Result<Vec<Page>, ScanError> {
    let pages = match content_type {
        ContentType::Pdf => load_pdf(bytes, opts)?,
        ContentType::Tiff => load_tiff(bytes, &opts.pages)?,
        other => load_single_image(bytes, other, &opts.pages)?,
    };
    info!("Loaded {} page(s) of {}", pages.len(), content_type);
    Ok(pages)
}

/// [`load_pages`] on the blocking thread pool.
pub async fn load_pages_async(
    bytes: Vec<u8>,
    content_type: ContentType,
    opts: LoadOptions,
) -> Result<Vec<Page>, ScanError> {
    tokio::task::spawn_blocking(move || load_pages(&bytes, content_type, &opts))
        .await
        .map_err(|e| ScanError::Internal(format!("Load task panicked: {}", e)))?
}

/// Resolve the selection against `total` pages, failing when nothing is left.
fn select(selection: &PageSelection, total: usize) -> Result<Vec<usize>, ScanError> {
    let indices = selection.to_indices(total);
    if indices.is_empty() {
        return Err(ScanError::PageOutOfRange {
            page: selection.first_requested(),
            total,
        });
    }
    Ok(indices)
}

fn load_single_image(
    bytes: &[u8],
    content_type: ContentType,
    selection: &PageSelection,
) -> Result<Vec<Page>, ScanError> {
    let format = content_type
        .image_format()
        .ok_or_else(|| ScanError::Internal(format!("{content_type} is not a raster format")))?;
    select(selection, 1)?;
    let bitmap = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        ScanError::CorruptDocument {
            detail: format!("{content_type}: {e}"),
        }
    })?;
    debug!("Decoded image {}x{}", bitmap.width(), bitmap.height());
    Ok(vec![Page { number: 1, bitmap }])
}

fn corrupt_tiff(e: impl fmt::Display) -> ScanError {
    ScanError::CorruptDocument {
        detail: format!("image/tiff: {e}"),
    }
}

fn load_tiff(bytes: &[u8], selection: &PageSelection) -> Result<Vec<Page>, ScanError> {
    // First pass only walks the IFD chain to learn the page count.
    let mut decoder = TiffDecoder::new(Cursor::new(bytes)).map_err(corrupt_tiff)?;
    let mut total = 1;
    while decoder.more_images() {
        decoder.next_image().map_err(corrupt_tiff)?;
        total += 1;
    }
    let wanted = select(selection, total)?;
    debug!("TIFF has {} IFD(s), decoding {}", total, wanted.len());

    let mut decoder = TiffDecoder::new(Cursor::new(bytes)).map_err(corrupt_tiff)?;
    let mut pages = Vec::with_capacity(wanted.len());
    let mut index = 0;
    for &target in &wanted {
        while index < target {
            decoder.next_image().map_err(corrupt_tiff)?;
            index += 1;
        }
        let bitmap = decode_tiff_frame(&mut decoder)?;
        debug!(
            "TIFF page {} → {}x{} px",
            target + 1,
            bitmap.width(),
            bitmap.height()
        );
        pages.push(Page {
            number: target + 1,
            bitmap,
        });
    }
    Ok(pages)
}

fn decode_tiff_frame(decoder: &mut TiffDecoder<Cursor<&[u8]>>) -> Result<DynamicImage, ScanError> {
    let (w, h) = decoder.dimensions().map_err(corrupt_tiff)?;
    let color = decoder.colortype().map_err(corrupt_tiff)?;
    let data = decoder.read_image().map_err(corrupt_tiff)?;

    let image = match (color, data) {
        (TiffColor::Gray(1), DecodingResult::U8(buf)) => {
            Some(DynamicImage::ImageLuma8(unpack_bilevel(&buf, w, h)))
        }
        (TiffColor::Gray(8), DecodingResult::U8(buf)) => {
            GrayImage::from_raw(w, h, buf).map(DynamicImage::ImageLuma8)
        }
        (TiffColor::Gray(16), DecodingResult::U16(buf)) => {
            ImageBuffer::<Luma<u16>, _>::from_raw(w, h, buf).map(DynamicImage::ImageLuma16)
        }
        (TiffColor::GrayA(8), DecodingResult::U8(buf)) => {
            GrayAlphaImage::from_raw(w, h, buf).map(DynamicImage::ImageLumaA8)
        }
        (TiffColor::RGB(8), DecodingResult::U8(buf)) => {
            RgbImage::from_raw(w, h, buf).map(DynamicImage::ImageRgb8)
        }
        (TiffColor::RGB(16), DecodingResult::U16(buf)) => {
            ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, buf).map(DynamicImage::ImageRgb16)
        }
        (TiffColor::RGBA(8), DecodingResult::U8(buf)) => {
            RgbaImage::from_raw(w, h, buf).map(DynamicImage::ImageRgba8)
        }
        (other, _) => {
            return Err(ScanError::UnsupportedFormat {
                content_type: format!("image/tiff ({other:?})"),
            })
        }
    };
    image.ok_or_else(|| corrupt_tiff(format!("pixel buffer does not match {w}x{h}")))
}

/// Expand a 1-bit-per-pixel buffer (rows padded to whole bytes, MSB first).
fn unpack_bilevel(packed: &[u8], width: u32, height: u32) -> GrayImage {
    let row_bytes = width.div_ceil(8) as usize;
    GrayImage::from_fn(width, height, |x, y| {
        let byte = packed
            .get(y as usize * row_bytes + (x / 8) as usize)
            .copied()
            .unwrap_or(0);
        let bit = (byte >> (7 - (x % 8))) & 1;
        Luma([if bit == 1 { 255 } else { 0 }])
    })
}

fn bind_pdfium(library: &PdfiumLibrary) -> Result<Pdfium, ScanError> {
    let bindings = match library {
        PdfiumLibrary::System => Pdfium::bind_to_system_library(),
        PdfiumLibrary::Path(path) => Pdfium::bind_to_library(path),
    };
    bindings
        .map(Pdfium::new)
        .map_err(|e| ScanError::PdfiumBindingFailed(format!("{:?}", e)))
}

fn load_pdf(bytes: &[u8], opts: &LoadOptions) -> Result<Vec<Page>, ScanError> {
    let pdfium = bind_pdfium(&opts.pdfium)?;
    let password = opts.password.as_deref();

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    ScanError::WrongPassword
                } else {
                    ScanError::PasswordRequired
                }
            } else {
                ScanError::CorruptDocument {
                    detail: format!("application/pdf: {err_str}"),
                }
            }
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let wanted = select(&opts.pages, total_pages)?;
    info!("PDF loaded: {} pages, rendering {}", total_pages, wanted.len());

    let mut results = Vec::with_capacity(wanted.len());
    for idx in wanted {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ScanError::CorruptDocument {
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;

        let (width, height) = render_size(
            page.width().value,
            page.height().value,
            opts.dpi,
            opts.max_rendered_pixels,
        );
        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ScanError::CorruptDocument {
                detail: format!("page {} could not be rendered: {:?}", idx + 1, e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(Page {
            number: idx + 1,
            bitmap: image,
        });
    }

    Ok(results)
}

/// Pixel size of a page of `width_pt × height_pt` points rendered at `dpi`,
/// scaled down so the longest edge does not exceed `max_pixels`.
fn render_size(width_pt: f32, height_pt: f32, dpi: u32, max_pixels: u32) -> (u32, u32) {
    let mut scale = dpi as f32 / 72.0;
    let longest = width_pt.max(height_pt) * scale;
    if longest > max_pixels as f32 {
        scale *= max_pixels as f32 / longest;
    }
    let w = ((width_pt * scale).round() as u32).max(1);
    let h = ((height_pt * scale).round() as u32).max(1);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([200])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn multi_page_tiff(shades: &[u8]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut out).unwrap();
            for &shade in shades {
                let data = vec![shade; 20 * 10];
                encoder
                    .write_image::<colortype::Gray8>(20, 10, &data)
                    .unwrap();
            }
        }
        out.into_inner()
    }

    #[test]
    fn mime_parsing_ignores_parameters_and_case() {
        assert_eq!(
            ContentType::from_mime("Image/PNG; charset=binary").unwrap(),
            ContentType::Png
        );
        assert_eq!(ContentType::from_mime("image/tif").unwrap(), ContentType::Tiff);
        assert_eq!(ContentType::from_mime("application/pdf").unwrap(), ContentType::Pdf);
    }

    #[test]
    fn unknown_mime_is_unsupported() {
        let err = ContentType::from_mime("text/plain").unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedFormat { content_type } if content_type == "text/plain"));
    }

    #[test]
    fn sniffing_magic_bytes() {
        assert_eq!(ContentType::sniff(b"%PDF-1.7\n"), Some(ContentType::Pdf));
        assert_eq!(ContentType::sniff(b"II*\0rest"), Some(ContentType::Tiff));
        assert_eq!(ContentType::sniff(&png_bytes(2, 2)), Some(ContentType::Png));
        assert_eq!(ContentType::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ContentType::WebP));
        assert_eq!(ContentType::sniff(b"hello"), None);
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(ContentType::from_path(Path::new("scan.TIF")), Some(ContentType::Tiff));
        assert_eq!(ContentType::from_path(Path::new("a/b.jpeg")), Some(ContentType::Jpeg));
        assert_eq!(ContentType::from_path(Path::new("notes.txt")), None);
        assert_eq!(ContentType::from_path(Path::new("noext")), None);
    }

    #[test]
    fn single_image_loads_as_page_one() {
        let pages = load_pages(&png_bytes(40, 30), ContentType::Png, &LoadOptions::default()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert_eq!((pages[0].bitmap.width(), pages[0].bitmap.height()), (40, 30));
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        let err = load_pages(b"not a png at all", ContentType::Png, &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::CorruptDocument { .. }));
    }

    #[test]
    fn multi_page_tiff_yields_every_page() {
        let bytes = multi_page_tiff(&[10, 128, 250]);
        let pages = load_pages(&bytes, ContentType::Tiff, &LoadOptions::default()).unwrap();
        let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(pages[1].bitmap.to_luma8().get_pixel(0, 0).0, [128]);
    }

    #[test]
    fn tiff_page_selection_keeps_source_numbers() {
        let bytes = multi_page_tiff(&[10, 128, 250]);
        let opts = LoadOptions {
            pages: PageSelection::Set(vec![3, 1]),
            ..Default::default()
        };
        let pages = load_pages(&bytes, ContentType::Tiff, &opts).unwrap();
        let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(pages[1].bitmap.to_luma8().get_pixel(5, 5).0, [250]);
    }

    #[test]
    fn empty_selection_is_out_of_range() {
        let bytes = multi_page_tiff(&[10, 20]);
        let opts = LoadOptions {
            pages: PageSelection::Single(5),
            ..Default::default()
        };
        let err = load_pages(&bytes, ContentType::Tiff, &opts).unwrap_err();
        assert!(matches!(err, ScanError::PageOutOfRange { page: 5, total: 2 }));
    }

    #[test]
    fn bilevel_rows_are_byte_padded() {
        // 10 px wide → 2 bytes per row; first pixel of row 1 set.
        let packed = [0x00, 0x00, 0x80, 0x00];
        let img = unpack_bilevel(&packed, 10, 2);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(0, 1).0, [255]);
        assert_eq!(img.get_pixel(1, 1).0, [0]);
    }

    #[test]
    fn render_size_respects_dpi_and_cap() {
        // US Letter at 300 DPI
        assert_eq!(render_size(612.0, 792.0, 300, 6000), (2550, 3300));
        // A0 is capped on its longest edge
        let (w, h) = render_size(2384.0, 3370.0, 300, 6000);
        assert_eq!(h, 6000);
        assert!(w < 6000);
    }
}
