//! CLI binary for barscan.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScanConfig` and prints the JSON report.

use anyhow::{Context, Result};
use barscan::{
    write_report, BarcodeScanner, ContentType, FullFrameDetector, PageSelection, PdfiumLibrary,
    ProgressCallback, RxingDecoder, ScanConfig, ScanProgressCallback, Symbology,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages may complete out of order when `--concurrency > 1`.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Running barcode total across pages.
    found: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_scan_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Loading");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            found: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scanning");
        self.bar.reset_eta();
    }

    fn start_times(&self) -> std::sync::MutexGuard<'_, HashMap<usize, Instant>> {
        self.start_times
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_pages} page(s) for barcodes…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times().insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, barcodes: usize) {
        let elapsed_ms = self
            .start_times()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        self.found.fetch_add(barcodes, Ordering::SeqCst);

        let count = format!("{barcodes:>2} barcode(s)");
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            if barcodes > 0 { green("✓") } else { dim("·") },
            page_num,
            total,
            if barcodes > 0 { count } else { dim(&count) },
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_scan_complete(&self, total_pages: usize, pages_with_barcodes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} barcode(s) on {}/{} page(s)",
            if pages_with_barcodes > 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&self.found.load(Ordering::SeqCst).to_string()),
            pages_with_barcodes,
            total_pages,
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan a PDF, report to stdout
  barscan delivery-note.pdf

  # Write the report to a file
  barscan batch.tif -o batch.json

  # Only EAN and QR codes on the first three pages
  barscan --pages 1-3 --formats ean13,ean8,qr_code scan.pdf

  # Include pages without barcodes, single-line JSON
  barscan --all-pages --compact scan.pdf | jq .

  # Scan from a URL whose server sends a generic content type
  barscan --content-type image/tiff https://example.com/download?id=42

SUPPORTED INPUTS:
  PDF (rasterised with pdfium), TIFF (every page), PNG, JPEG, BMP, GIF, WebP

SYMBOLOGIES (--formats):
  code_128 code_39 code_93 codabar ean_13 ean_8 upc_a upc_e itf
  qr_code data_matrix pdf_417 aztec

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium; otherwise the system library path is searched
  RUST_LOG          Override the log filter (e.g. barscan=debug)
"#;

/// Find and decode barcodes in scanned documents.
#[derive(Parser, Debug)]
#[command(
    name = "barscan",
    version,
    about = "Find and decode barcodes in scanned PDFs, TIFFs and images",
    long_about = "Find and decode barcodes in scanned documents. Each page is split into \
overlapping regions, every candidate is cropped with its quiet zone and run through a \
cascade of binarisations until the decoder reads it. Prints a JSON report.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    input: String,

    /// Write the JSON report to this file instead of stdout.
    #[arg(short, long, env = "BARSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// Override format detection with a MIME type (application/pdf, image/tiff, …).
    #[arg(long, env = "BARSCAN_CONTENT_TYPE")]
    content_type: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "BARSCAN_PAGES", default_value = "all")]
    pages: String,

    /// PDF rendering DPI (72–600).
    #[arg(long, env = "BARSCAN_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Minimum detector confidence (0.0–1.0).
    #[arg(long, env = "BARSCAN_CONFIDENCE", default_value_t = 0.25)]
    confidence: f32,

    /// Quadrant overlap ratio (0.0–0.5).
    #[arg(long, env = "BARSCAN_OVERLAP", default_value_t = 0.2)]
    overlap: f32,

    /// Comma-separated symbologies to accept (default: common retail and logistics set).
    #[arg(long, env = "BARSCAN_FORMATS")]
    formats: Option<String>,

    /// Pages scanned in parallel.
    #[arg(short, long, env = "BARSCAN_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "BARSCAN_PASSWORD")]
    password: Option<String>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Per-region detector timeout in seconds (0 disables).
    #[arg(long, env = "BARSCAN_DETECTOR_TIMEOUT", default_value_t = 30)]
    detector_timeout: u64,

    /// Include pages without barcodes in the report.
    #[arg(long, env = "BARSCAN_ALL_PAGES")]
    all_pages: bool,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long, env = "BARSCAN_COMPACT")]
    compact: bool,

    /// Disable progress bar.
    #[arg(long, env = "BARSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BARSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BARSCAN_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "BARSCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the progress bar; keep them for
    // --no-progress runs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ScanProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let content_type = cli
        .content_type
        .as_deref()
        .map(str::parse::<ContentType>)
        .transpose()
        .context("Invalid --content-type")?;

    let scanner = BarcodeScanner::new(
        config,
        Arc::new(FullFrameDetector),
        Arc::new(RxingDecoder::new()),
    );

    // ── Run scan ─────────────────────────────────────────────────────────
    let start = Instant::now();
    let doc = scanner
        .scan_as(&cli.input, content_type)
        .await
        .context("Scan failed")?;

    let report = if cli.all_pages {
        doc.report_all_pages()
    } else {
        doc.report()
    };

    if let Some(ref output_path) = cli.output {
        write_report(output_path, &report, !cli.compact)
            .await
            .context("Failed to write report")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} barcode(s)  {}ms  →  {}",
                green("✔"),
                report.total_barcodes,
                start.elapsed().as_millis(),
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let json = if cli.compact {
            serde_json::to_string(&report)
        } else {
            serde_json::to_string_pretty(&report)
        }
        .context("Failed to serialise report")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;

        if !cli.quiet && !show_progress {
            eprintln!(
                "Found {} barcode(s) on {}/{} page(s) in {}ms",
                report.total_barcodes,
                report.detected_pages,
                report.total_pages,
                start.elapsed().as_millis()
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let detector_timeout = match cli.detector_timeout {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let mut builder = ScanConfig::builder()
        .dpi(cli.dpi)
        .confidence_threshold(cli.confidence)
        .overlap_ratio(cli.overlap)
        .concurrency(cli.concurrency)
        .pages(parse_pages(&cli.pages)?)
        .detector_timeout(detector_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref list) = cli.formats {
        builder = builder.symbologies(parse_formats(list)?);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium(PdfiumLibrary::Path(path.clone()));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--formats` into a symbology allow-list.
fn parse_formats(s: &str) -> Result<BTreeSet<Symbology>> {
    let formats = s
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| f.parse::<Symbology>().with_context(|| format!("Invalid format '{f}'")))
        .collect::<Result<BTreeSet<_>>>()?;
    if formats.is_empty() {
        anyhow::bail!("--formats needs at least one symbology");
    }
    Ok(formats)
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if pages.contains(&0) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_parse_all_forms() {
        assert_eq!(parse_pages("all").unwrap(), PageSelection::All);
        assert_eq!(parse_pages(" 4 ").unwrap(), PageSelection::Single(4));
        assert_eq!(parse_pages("2-5").unwrap(), PageSelection::Range(2, 5));
        assert_eq!(
            parse_pages("1,3,5").unwrap(),
            PageSelection::Set(vec![1, 3, 5])
        );
    }

    #[test]
    fn pages_reject_zero_and_reversed_ranges() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("5-2").is_err());
        assert!(parse_pages("0,2").is_err());
        assert!(parse_pages("two").is_err());
    }

    #[test]
    fn formats_accept_loose_spelling() {
        let set = parse_formats("ean13, QR_CODE,code-128").unwrap();
        assert_eq!(
            set,
            [Symbology::Ean13, Symbology::QrCode, Symbology::Code128]
                .into_iter()
                .collect()
        );
        assert!(parse_formats("ean13,morse").is_err());
        assert!(parse_formats(" , ").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
