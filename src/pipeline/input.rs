//! Input resolution: normalise a user-supplied path or URL to document bytes.
//!
//! Every loader works from memory (pdfium included, via
//! `load_pdf_from_byte_slice`), so local files are read and URLs downloaded
//! straight into a buffer. No temp file is involved.
//!
//! ## Content type precedence
//!
//! 1. An explicit hint from the caller (`--content-type`).
//! 2. For URLs, the `Content-Type` response header, unless it is a generic
//!    `application/octet-stream`.
//! 3. The magic bytes of the payload.
//! 4. The file extension of the path or URL.
//!
//! Magic bytes beat extensions because scanners and mail gateways routinely
//! save TIFFs as `.pdf` or JPEGs as `.png`.

use crate::error::ScanError;
use crate::pipeline::load::ContentType;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A document in memory with its detected format.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub bytes: Vec<u8>,
    pub content_type: ContentType,
    /// Path or URL the bytes came from, for log messages.
    pub source: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to document bytes.
///
/// If the input is a URL, download it. If the input is a local file,
/// validate it exists and is readable.
pub async fn resolve_input(
    input: &str,
    content_type: Option<ContentType>,
    timeout_secs: u64,
) -> Result<ResolvedInput, ScanError> {
    if input.trim().is_empty() {
        return Err(ScanError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, content_type, timeout_secs).await
    } else {
        resolve_local(input, content_type).await
    }
}

/// Pick the content type for `bytes` from the available evidence.
pub fn detect_content_type(
    hint: Option<ContentType>,
    bytes: &[u8],
    name: &str,
) -> Result<ContentType, ScanError> {
    hint.or_else(|| ContentType::sniff(bytes))
        .or_else(|| ContentType::from_path(Path::new(name)))
        .ok_or_else(|| ScanError::UnsupportedFormat {
            content_type: describe_unknown(bytes, name),
        })
}

fn describe_unknown(bytes: &[u8], name: &str) -> String {
    let magic: Vec<String> = bytes.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("unknown ({name}, magic {})", magic.join(" "))
}

/// Read a local file, validating existence and permission.
async fn resolve_local(
    path_str: &str,
    hint: Option<ContentType>,
) -> Result<ResolvedInput, ScanError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ScanError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ScanError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ScanError::PermissionDenied { path });
        }
        Err(_) => return Err(ScanError::FileNotFound { path }),
    };

    let content_type = detect_content_type(hint, &bytes, path_str)?;
    debug!(
        "Resolved local {} ({} bytes): {}",
        content_type,
        bytes.len(),
        path.display()
    );
    Ok(ResolvedInput {
        bytes,
        content_type,
        source: path_str.to_string(),
    })
}

/// Download a URL into memory.
async fn download_url(
    url: &str,
    hint: Option<ContentType>,
    timeout_secs: u64,
) -> Result<ResolvedInput, ScanError> {
    info!("Downloading document from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| ScanError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let timeout_or_failure = |e: reqwest::Error| {
        if e.is_timeout() {
            ScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(parsed.clone()).send().await.map_err(timeout_or_failure)?;

    if !response.status().is_success() {
        return Err(ScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let header_type = header_content_type(
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    );

    let bytes = response.bytes().await.map_err(timeout_or_failure)?.to_vec();

    let name = url_file_name(&parsed).unwrap_or_default();
    let content_type = detect_content_type(hint.or(header_type), &bytes, &name)?;
    info!("Downloaded {} bytes of {}", bytes.len(), content_type);

    Ok(ResolvedInput {
        bytes,
        content_type,
        source: url.to_string(),
    })
}

/// Content type named by a response header. Generic or unknown types
/// (`application/octet-stream` included) defer to sniffing.
fn header_content_type(mime: Option<&str>) -> Option<ContentType> {
    mime.and_then(|m| ContentType::from_mime(m).ok())
}

/// Last non-empty path segment of a URL, if it looks like a file name.
fn url_file_name(url: &reqwest::Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/scan.tif"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn hint_wins_over_sniffing() {
        let ct = detect_content_type(Some(ContentType::Png), b"%PDF-1.4", "x.pdf").unwrap();
        assert_eq!(ct, ContentType::Png);
    }

    #[test]
    fn response_header_wins_over_magic_bytes() {
        let header = header_content_type(Some("image/tiff; charset=binary"));
        let ct = detect_content_type(header, b"%PDF-1.4", "scan.pdf").unwrap();
        assert_eq!(ct, ContentType::Tiff);

        let generic = header_content_type(Some("application/octet-stream"));
        assert_eq!(generic, None);
        let ct = detect_content_type(generic, b"%PDF-1.4", "scan.tif").unwrap();
        assert_eq!(ct, ContentType::Pdf);
    }

    #[test]
    fn magic_bytes_win_over_extension() {
        let ct = detect_content_type(None, b"II*\0....", "mislabelled.pdf").unwrap();
        assert_eq!(ct, ContentType::Tiff);
    }

    #[test]
    fn extension_is_last_resort() {
        let ct = detect_content_type(None, b"????", "scan.jpeg").unwrap();
        assert_eq!(ct, ContentType::Jpeg);
        let err = detect_content_type(None, b"????", "notes.txt").unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedFormat { .. }));
    }

    #[test]
    fn url_file_name_needs_extension() {
        let u = reqwest::Url::parse("https://host/a/b/scan.tif?x=1").unwrap();
        assert_eq!(url_file_name(&u).as_deref(), Some("scan.tif"));
        let u = reqwest::Url::parse("https://host/download").unwrap();
        assert_eq!(url_file_name(&u), None);
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", None, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", None, 5).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read_and_sniffed() {
        let mut tmp = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.7\nrest").unwrap();
        let resolved = resolve_input(tmp.path().to_str().unwrap(), None, 5)
            .await
            .unwrap();
        assert_eq!(resolved.content_type, ContentType::Pdf);
        assert_eq!(resolved.bytes.len(), 13);
    }
}
