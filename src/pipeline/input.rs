//! Input resolution: turn a user-supplied path or URL into an in-memory
//! [`Upload`], and the checks each entry point applies before parsing.
//!
//! Everything downstream works from bytes: calamine reads the workbook from
//! a cursor, pdfium loads the document from a byte slice, and images go
//! straight to the encoder. No temp files are needed.

use crate::error::{Table2XlsxError, UnitError};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PDF_MAGIC: &[u8] = b"%PDF";

/// An uploaded file: its display name and raw contents.
#[derive(Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    fn has_extension(&self, ext: &str) -> bool {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL.
pub async fn load(input: &str, timeout_secs: u64) -> Result<Upload, Table2XlsxError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Load several inputs in order; the first failure aborts.
pub async fn load_all(inputs: &[String], timeout_secs: u64) -> Result<Vec<Upload>, Table2XlsxError> {
    let mut uploads = Vec::with_capacity(inputs.len());
    for input in inputs {
        uploads.push(load(input, timeout_secs).await?);
    }
    Ok(uploads)
}

async fn read_local(path: &Path) -> Result<Upload, Table2XlsxError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Table2XlsxError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Table2XlsxError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(Upload::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Upload, Table2XlsxError> {
    info!("Downloading: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Table2XlsxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Table2XlsxError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Table2XlsxError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(Table2XlsxError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_err)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(Upload::new(filename_from_url(url), bytes.to_vec()))
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "download".to_string())
}

/// A spreadsheet upload must be named `*.xlsx` and be a zip container.
pub fn validate_sheet(upload: &Upload) -> Result<(), Table2XlsxError> {
    if !upload.has_extension("xlsx") {
        return Err(Table2XlsxError::UnsupportedFileType {
            name: upload.name.clone(),
            expected: ".xlsx".into(),
        });
    }
    if !upload.bytes.starts_with(ZIP_MAGIC) {
        return Err(Table2XlsxError::InvalidSpreadsheet {
            name: upload.name.clone(),
            detail: "not an xlsx workbook (missing zip signature)".into(),
        });
    }
    Ok(())
}

/// A PDF upload must be named `*.pdf` and start with `%PDF`.
pub fn validate_pdf(upload: &Upload) -> Result<(), Table2XlsxError> {
    if !upload.has_extension("pdf") {
        return Err(Table2XlsxError::UnsupportedFileType {
            name: upload.name.clone(),
            expected: ".pdf".into(),
        });
    }
    if !upload.bytes.starts_with(PDF_MAGIC) {
        return Err(Table2XlsxError::CorruptPdf {
            name: upload.name.clone(),
            detail: "missing %PDF header".into(),
        });
    }
    Ok(())
}

/// Sniff an image upload. Unrecognised content fails only this unit.
pub fn image_format(unit: usize, upload: &Upload) -> Result<image::ImageFormat, UnitError> {
    image::guess_format(&upload.bytes).map_err(|e| UnitError::ReadFailed {
        unit,
        label: upload.name.clone(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/sheet.png"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn url_file_names() {
        assert_eq!(filename_from_url("https://x.test/a/report.pdf"), "report.pdf");
        assert_eq!(filename_from_url("https://x.test/a/"), "download");
        assert_eq!(filename_from_url("https://x.test/export"), "download");
    }

    #[test]
    fn sheet_validation() {
        let ok = Upload::new("leads.XLSX", b"PK\x03\x04rest".to_vec());
        assert!(validate_sheet(&ok).is_ok());

        let wrong_ext = Upload::new("leads.csv", b"PK\x03\x04".to_vec());
        assert!(matches!(
            validate_sheet(&wrong_ext),
            Err(Table2XlsxError::UnsupportedFileType { .. })
        ));

        let not_zip = Upload::new("leads.xlsx", b"Name,Email".to_vec());
        assert!(matches!(
            validate_sheet(&not_zip),
            Err(Table2XlsxError::InvalidSpreadsheet { .. })
        ));
    }

    #[test]
    fn pdf_validation() {
        assert!(validate_pdf(&Upload::new("a.pdf", b"%PDF-1.7".to_vec())).is_ok());
        assert!(matches!(
            validate_pdf(&Upload::new("a.pdf", b"<html>".to_vec())),
            Err(Table2XlsxError::CorruptPdf { .. })
        ));
        assert!(matches!(
            validate_pdf(&Upload::new("a.docx", b"%PDF".to_vec())),
            Err(Table2XlsxError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn image_sniffing() {
        let png = Upload::new("x.png", b"\x89PNG\r\n\x1a\n0000".to_vec());
        assert_eq!(image_format(1, &png).unwrap(), image::ImageFormat::Png);

        let text = Upload::new("x.png", b"hello".to_vec());
        assert!(matches!(
            image_format(2, &text),
            Err(UnitError::ReadFailed { unit: 2, .. })
        ));
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = load("/definitely/not/here.xlsx", 5).await.unwrap_err();
        assert!(matches!(err, Table2XlsxError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"abc").unwrap();
        let upload = load(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(upload.name, "shot.png");
        assert_eq!(upload.bytes, b"abc");
    }
}
