//! Pipeline stages for barcode scanning.
//!
//! Each submodule implements exactly one step, so every stage can be tested
//! on its own and the detector or decoder swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ load ──▶ regions ──▶ detect ──▶ crop ──▶ enhance ──▶ decode ──▶ aggregate
//! (path/URL) (pages)  (6 per page) (boxes)   (padded)  (≤9 variants) (first hit) (dedup + map)
//! ```
//!
//! 1. [`input`]     — read a local file or download a URL into memory
//! 2. [`load`]      — turn bytes into page bitmaps (images, multi-page TIFF, PDF)
//! 3. [`regions`]   — four overlapping quadrants, the full page, and a half-resolution copy
//! 4. [`detect`]    — injected candidate detector, called under a deadline
//! 5. [`crop`]      — padded, aspect-corrected crop around each accepted detection
//! 6. [`enhance`]   — lazily evaluated cascade of single-channel variants
//! 7. [`decode`]    — injected symbol decoder, stopping at the first success
//! 8. [`aggregate`] — per-page dedup by content and region → page coordinate mapping
//! 9. [`page`]      — drives steps 3–8 for one page

pub mod aggregate;
pub mod crop;
pub mod deadline;
pub mod decode;
pub mod detect;
pub mod enhance;
pub mod input;
pub mod load;
pub mod page;
pub mod regions;
#[cfg(feature = "rxing")]
pub mod rxing_decoder;
