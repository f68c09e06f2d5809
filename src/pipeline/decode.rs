//! Symbol decoding contract and the first-success policy.
//!
//! The scanner does not read bars itself. A [`SymbolDecoder`] is injected
//! and handed one enhancement variant at a time; [`decode_first`] walks the
//! cascade and stops at the first variant the decoder accepts. A crop whose
//! variants are all rejected yields nothing. That is a normal outcome, not
//! an error.

use crate::config::{ScanConfig, Symbology};
use crate::pipeline::deadline::{run_with_deadline, DeadlineError, DeadlineWorker};
use crate::pipeline::enhance::{EnhancementCascade, Variant};
use image::GrayImage;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Hints passed unchanged with every decode call of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeHints {
    /// Spend more effort per attempt.
    pub try_harder: bool,
    /// The bitmap holds only the symbol, no surrounding scene.
    pub pure_barcode: bool,
    /// Symbologies the decoder may report.
    pub formats: BTreeSet<Symbology>,
}

impl Default for DecodeHints {
    fn default() -> Self {
        Self {
            try_harder: true,
            pure_barcode: true,
            formats: Symbology::default_set(),
        }
    }
}

impl From<&ScanConfig> for DecodeHints {
    fn from(config: &ScanConfig) -> Self {
        Self {
            try_harder: config.try_harder,
            pure_barcode: config.pure_barcode,
            formats: config.symbologies.clone(),
        }
    }
}

/// A successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    pub text: String,
    pub format: Symbology,
}

/// Reads one symbol from a single-channel bitmap.
///
/// Returns `None` when nothing could be read. Implementations must be free
/// of side effects and callable from several threads at once.
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, bitmap: &GrayImage, hints: &DecodeHints) -> Option<DecodedSymbol>;
}

/// Result of walking the cascade for one crop.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    pub symbol: DecodedSymbol,
    /// Variant that produced the decode.
    pub variant: Variant,
    /// 1-based position of that variant in the cascade.
    pub attempts: usize,
}

/// Try each cascade variant in order and return the first accepted decode.
///
/// A decode is accepted only when its text is non-empty and its format is in
/// `hints.formats`. A decode call that exceeds `timeout` counts as a failed
/// variant and the walk continues. Bounded attempts share one worker thread
/// until one of them overruns.
pub fn decode_first(
    cascade: EnhancementCascade,
    decoder: &Arc<dyn SymbolDecoder>,
    hints: &Arc<DecodeHints>,
    timeout: Option<Duration>,
) -> Option<DecodeOutcome> {
    let mut worker = timeout.map(DeadlineWorker::new);
    cascade
        .enumerate()
        .find_map(|(i, (variant, bitmap))| {
            let symbol = attempt(bitmap, decoder, hints, worker.as_mut(), variant)?;
            if symbol.text.is_empty() || !hints.formats.contains(&symbol.format) {
                trace!("Variant {} decoded {:?}, rejected", variant, symbol);
                return None;
            }
            debug!(
                "Decoded {} '{}' with variant {} (attempt {})",
                symbol.format,
                symbol.text,
                variant,
                i + 1
            );
            Some(DecodeOutcome {
                symbol,
                variant,
                attempts: i + 1,
            })
        })
}

fn attempt(
    bitmap: GrayImage,
    decoder: &Arc<dyn SymbolDecoder>,
    hints: &Arc<DecodeHints>,
    worker: Option<&mut DeadlineWorker<Option<DecodedSymbol>>>,
    variant: Variant,
) -> Option<DecodedSymbol> {
    let decoder = Arc::clone(decoder);
    let hints = Arc::clone(hints);
    let call = move || decoder.decode(&bitmap, &hints);
    let outcome = match worker {
        Some(worker) => worker.run(call),
        None => run_with_deadline(None, call),
    };
    match outcome {
        Ok(symbol) => symbol,
        Err(DeadlineError::TimedOut(limit)) => {
            debug!("Variant {} timed out after {:?}", variant, limit);
            None
        }
        Err(e) => {
            debug!("Variant {} failed: {}", variant, e);
            None
        }
    }
}
