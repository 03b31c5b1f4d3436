//! Error types for the edgequake-table2xlsx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Table2XlsxError`] — **Fatal**: the operation cannot produce a table
//!   (wrong file type, unreadable workbook, every unit failed). Returned as
//!   `Err(Table2XlsxError)` from the top-level `extract_*` functions.
//!
//! * [`UnitError`] — **Non-fatal**: a single image or PDF page failed (render
//!   glitch, HTTP error, invalid JSON) but the rest of the batch is fine.
//!   Stored inside [`crate::output::UnitResult`] so callers can inspect partial
//!   success rather than losing the whole batch to one bad unit.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-table2xlsx library.
///
/// Unit-level failures use [`UnitError`] and are stored in
/// [`crate::output::UnitResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Table2XlsxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The caller supplied no file at all (empty selection).
    #[error("No {what} selected.")]
    NoInput { what: String },

    /// The upload does not have the expected extension or magic bytes.
    #[error("'{name}' is not a valid {expected} file")]
    UnsupportedFileType { name: String, expected: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Spreadsheet errors ────────────────────────────────────────────────
    /// The bytes could not be opened as an xlsx workbook.
    #[error("'{name}' could not be read as a spreadsheet: {detail}")]
    InvalidSpreadsheet { name: String, detail: String },

    /// The workbook has no sheet with the name the layout expects.
    #[error("Sheet '{sheet}' not found in '{name}'")]
    SheetNotFound { name: String, sheet: String },

    /// The sheet does not have the shape the selected layout needs.
    #[error("Sheet does not match the {layout} layout: {detail}")]
    LayoutMismatch { layout: String, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' could not be opened: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Result errors ─────────────────────────────────────────────────────
    /// Processing finished but produced zero usable records.
    #[error("No data extracted: {context}")]
    NoData { context: String },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// No artifact is associated with the given handle (or none was given).
    #[error("No file available to download. Please process a file first.")]
    NoArtifact,

    /// Could not create, write or read an artifact file.
    #[error("Artifact I/O failed for '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Table2XlsxError {
    /// Shorthand for [`Table2XlsxError::NoData`].
    pub fn no_data(context: impl Into<String>) -> Self {
        Table2XlsxError::NoData {
            context: context.into(),
        }
    }

    /// True when the operation ran but found nothing to tabulate.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Table2XlsxError::NoData { .. })
    }
}

/// A non-fatal error for a single unit (one image or one PDF page).
///
/// Stored alongside [`crate::output::UnitResult`] when a unit fails.
/// The batch continues; only an empty batch becomes fatal.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The upload for this unit could not be read or is not an image.
    #[error("Unit {unit}: could not read '{label}': {detail}")]
    ReadFailed {
        unit: usize,
        label: String,
        detail: String,
    },

    /// PDF page rasterisation failed.
    #[error("Page {unit}: rasterisation failed: {detail}")]
    RenderFailed { unit: usize, detail: String },

    /// PNG encoding of a rendered page failed.
    #[error("Page {unit}: image encoding failed: {detail}")]
    EncodeFailed { unit: usize, detail: String },

    /// The AI call itself failed (transport, HTTP status, provider error).
    #[error("Unit {unit}: AI call failed: {detail}")]
    LlmFailed { unit: usize, detail: String },

    /// The AI call did not answer within the configured timeout.
    #[error("Unit {unit}: AI call timed out after {secs}s")]
    Timeout { unit: usize, secs: u64 },

    /// The AI answered with no text. The page might be blank.
    #[error("Unit {unit}: AI returned no data")]
    EmptyResponse { unit: usize },

    /// The AI answer was not valid JSON after fence stripping.
    #[error("Unit {unit}: AI returned invalid JSON: {detail}")]
    InvalidJson { unit: usize, detail: String },

    /// The AI answer was JSON, but not an array of rows.
    #[error("Unit {unit}: expected a JSON array of objects, got {found}")]
    NotAnArray { unit: usize, found: String },
}

impl UnitError {
    /// 1-based index of the unit this error belongs to.
    pub fn unit(&self) -> usize {
        match self {
            UnitError::ReadFailed { unit, .. }
            | UnitError::RenderFailed { unit, .. }
            | UnitError::EncodeFailed { unit, .. }
            | UnitError::LlmFailed { unit, .. }
            | UnitError::Timeout { unit, .. }
            | UnitError::EmptyResponse { unit }
            | UnitError::InvalidJson { unit, .. }
            | UnitError::NotAnArray { unit, .. } => *unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_display_and_predicate() {
        let e = Table2XlsxError::no_data("the AI could not extract any data from the PDF");
        assert!(e.is_no_data());
        assert!(e.to_string().contains("from the PDF"), "got: {e}");
    }

    #[test]
    fn no_artifact_display() {
        let e = Table2XlsxError::NoArtifact;
        assert!(e.to_string().contains("No file available"));
        assert!(!e.is_no_data());
    }

    #[test]
    fn unsupported_file_type_display() {
        let e = Table2XlsxError::UnsupportedFileType {
            name: "report.csv".into(),
            expected: ".xlsx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("report.csv"));
        assert!(msg.contains(".xlsx"));
    }

    #[test]
    fn unit_error_carries_unit_index() {
        let e = UnitError::InvalidJson {
            unit: 2,
            detail: "expected value at line 1 column 1".into(),
        };
        assert_eq!(e.unit(), 2);
        assert!(e.to_string().starts_with("Unit 2"));

        let t = UnitError::Timeout { unit: 7, secs: 60 };
        assert_eq!(t.unit(), 7);
        assert!(t.to_string().contains("60s"));
    }
}
