//! [`SymbolDecoder`] backed by rxing, a Rust port of ZXing.

use crate::config::Symbology;
use crate::pipeline::decode::{DecodeHints, DecodedSymbol, SymbolDecoder};
use image::GrayImage;
use rxing::common::HybridBinarizer;
use rxing::{
    BarcodeFormat, BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary,
    Luma8LuminanceSource, MultiUseMultiFormatReader, Reader,
};
use std::collections::HashSet;
use tracing::trace;

/// Decodes 1-D and 2-D symbols with rxing's multi-format reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct RxingDecoder;

impl RxingDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn to_rxing(symbology: Symbology) -> BarcodeFormat {
    match symbology {
        Symbology::Code128 => BarcodeFormat::CODE_128,
        Symbology::Code39 => BarcodeFormat::CODE_39,
        Symbology::Code93 => BarcodeFormat::CODE_93,
        Symbology::Codabar => BarcodeFormat::CODABAR,
        Symbology::Ean13 => BarcodeFormat::EAN_13,
        Symbology::Ean8 => BarcodeFormat::EAN_8,
        Symbology::UpcA => BarcodeFormat::UPC_A,
        Symbology::UpcE => BarcodeFormat::UPC_E,
        Symbology::Itf => BarcodeFormat::ITF,
        Symbology::QrCode => BarcodeFormat::QR_CODE,
        Symbology::DataMatrix => BarcodeFormat::DATA_MATRIX,
        Symbology::Pdf417 => BarcodeFormat::PDF_417,
        Symbology::Aztec => BarcodeFormat::AZTEC,
    }
}

fn from_rxing(format: &BarcodeFormat) -> Option<Symbology> {
    Symbology::ALL
        .into_iter()
        .find(|&sym| to_rxing(sym) == *format)
}

fn hint_dictionary(hints: &DecodeHints) -> DecodingHintDictionary {
    let formats: HashSet<BarcodeFormat> = hints.formats.iter().map(|&s| to_rxing(s)).collect();
    let mut dict = DecodingHintDictionary::new();
    dict.insert(
        DecodeHintType::TRY_HARDER,
        DecodeHintValue::TryHarder(hints.try_harder),
    );
    dict.insert(
        DecodeHintType::PURE_BARCODE,
        DecodeHintValue::PureBarcode(hints.pure_barcode),
    );
    dict.insert(
        DecodeHintType::POSSIBLE_FORMATS,
        DecodeHintValue::PossibleFormats(formats),
    );
    dict
}

impl SymbolDecoder for RxingDecoder {
    fn decode(&self, bitmap: &GrayImage, hints: &DecodeHints) -> Option<DecodedSymbol> {
        // Raw luma bytes keep rxing's own `image` version out of the signature.
        let source =
            Luma8LuminanceSource::new(bitmap.as_raw().clone(), bitmap.width(), bitmap.height());
        let mut binary = BinaryBitmap::new(HybridBinarizer::new(source));
        let mut reader = MultiUseMultiFormatReader::default();

        let result = match reader.decode_with_hints(&mut binary, &hint_dictionary(hints)) {
            Ok(r) => r,
            Err(e) => {
                trace!("rxing: {}", e);
                return None;
            }
        };
        let format = from_rxing(result.getBarcodeFormat())?;
        Some(DecodedSymbol {
            text: result.getText().to_string(),
            format,
        })
    }
}
