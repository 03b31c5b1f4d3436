//! Artifact writer and store: [`Table`] → `.xlsx` file → download handle.
//!
//! Every artifact gets a fresh `<uuid-v4>.xlsx` name and is created with
//! `create_new`, so concurrent writers never overwrite each other. The store
//! bounds its directory two ways: an artifact is deleted once it has been
//! downloaded, and [`ArtifactStore::sweep`] evicts anything older than the
//! TTL (run before every write).
//!
//! The workbook itself is a single sheet of string cells written with
//! `rust_xlsxwriter`.

use crate::config::ExtractionConfig;
use crate::error::Table2XlsxError;
use crate::record::Table;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// File extension of every artifact.
pub const ARTIFACT_EXTENSION: &str = "xlsx";

/// Sheet name used for generated tables.
pub const OUTPUT_SHEET: &str = "Sheet1";

// ── Handles ──────────────────────────────────────────────────────────────

/// Name of a generated artifact, returned by [`ArtifactStore::write_table`]
/// and required by [`ArtifactStore::take`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle(String);

impl ArtifactHandle {
    fn generate() -> Self {
        Self(format!("{}.{}", Uuid::new_v4(), ARTIFACT_EXTENSION))
    }

    /// Accept only `<uuid>.xlsx`; anything else could name a file outside
    /// the store.
    pub fn parse(s: &str) -> Option<Self> {
        let stem = s.strip_suffix(ARTIFACT_EXTENSION)?.strip_suffix('.')?;
        Uuid::parse_str(stem).ok()?;
        Some(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Store ────────────────────────────────────────────────────────────────

/// Staging directory of generated artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    ttl: Duration,
}

impl ArtifactStore {
    /// Open (and create if needed) the staging directory.
    pub async fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, Table2XlsxError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Table2XlsxError::ArtifactWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
        Ok(Self { dir, ttl })
    }

    /// Open the store described by `config.staging_dir` / `config.artifact_ttl_secs`.
    pub async fn from_config(config: &ExtractionConfig) -> Result<Self, Table2XlsxError> {
        Self::open(
            config.staging_dir.clone(),
            Duration::from_secs(config.artifact_ttl_secs),
        )
        .await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact lives at (whether or not it still exists).
    pub fn path_of(&self, handle: &ArtifactHandle) -> PathBuf {
        self.dir.join(handle.as_str())
    }

    /// Serialise `table` (header row + one row per record) to a new artifact.
    pub async fn write_table(&self, table: &Table) -> Result<ArtifactHandle, Table2XlsxError> {
        if let Err(e) = self.sweep().await {
            warn!("Artifact sweep failed: {}", e);
        }

        let mut rows: Vec<Vec<String>> = Vec::with_capacity(table.len() + 1);
        rows.push(table.headers().to_vec());
        rows.extend(
            table
                .rows()
                .map(|r| r.into_iter().map(str::to_string).collect()),
        );
        let bytes = tokio::task::spawn_blocking(move || write_workbook(OUTPUT_SHEET, &rows))
            .await
            .map_err(|e| Table2XlsxError::Internal(format!("Workbook task panicked: {}", e)))??;

        let handle = ArtifactHandle::generate();
        let path = self.path_of(&handle);
        let io_err = |source| Table2XlsxError::ArtifactWriteFailed {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(&bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        info!(
            "Wrote artifact {} ({} rows, {} bytes)",
            handle,
            table.len(),
            bytes.len()
        );
        Ok(handle)
    }

    /// Download an artifact: return its bytes and delete it.
    ///
    /// # Errors
    /// [`Table2XlsxError::NoArtifact`] when `handle` is `None`, unknown,
    /// already downloaded or expired.
    pub async fn take(&self, handle: Option<&ArtifactHandle>) -> Result<Vec<u8>, Table2XlsxError> {
        let handle = handle.ok_or(Table2XlsxError::NoArtifact)?;
        let path = self.path_of(handle);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Table2XlsxError::NoArtifact)
            }
            Err(e) => return Err(Table2XlsxError::ArtifactWriteFailed { path, source: e }),
        };
        if self.is_expired(&metadata) {
            debug!("Artifact {} expired before download", handle);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(Table2XlsxError::NoArtifact);
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| Table2XlsxError::ArtifactWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Could not delete downloaded artifact {}: {}", handle, e);
        }
        info!("Artifact {} downloaded ({} bytes)", handle, bytes.len());
        Ok(bytes)
    }

    /// Delete artifacts older than the TTL. Returns how many were removed.
    ///
    /// Files that are not artifact-shaped are left alone.
    pub async fn sweep(&self) -> Result<usize, Table2XlsxError> {
        let io_err = |source| Table2XlsxError::ArtifactWriteFailed {
            path: self.dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name();
            let Some(handle) = name.to_str().and_then(ArtifactHandle::parse) else {
                continue;
            };
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if self.is_expired(&metadata) {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => {
                        debug!("Evicted expired artifact {}", handle);
                        removed += 1;
                    }
                    Err(e) => warn!("Could not evict {}: {}", handle, e),
                }
            }
        }

        if removed > 0 {
            info!("Sweep removed {} expired artifacts", removed);
        }
        Ok(removed)
    }

    fn is_expired(&self, metadata: &std::fs::Metadata) -> bool {
        metadata
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .is_some_and(|age| age > self.ttl)
    }
}

// ── Workbook writer ──────────────────────────────────────────────────────

/// Build a single-sheet xlsx workbook from string rows.
///
/// Empty strings produce no cell, so readers see them as blank.
pub fn write_workbook(sheet_name: &str, rows: &[Vec<String>]) -> Result<Vec<u8>, Table2XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(sheet_name)
        .map_err(|e| xlsx_error("sheet name", e))?;

    for (r, row) in rows.iter().enumerate() {
        let r = u32::try_from(r)
            .map_err(|_| Table2XlsxError::Internal(format!("xlsx row {r} out of range")))?;
        for (c, value) in row.iter().enumerate().filter(|(_, v)| !v.is_empty()) {
            let c = u16::try_from(c)
                .map_err(|_| Table2XlsxError::Internal(format!("xlsx column {c} out of range")))?;
            sheet
                .write_string(r, c, value)
                .map_err(|e| xlsx_error("cell", e))?;
        }
    }

    let bytes = workbook
        .save_to_buffer()
        .map_err(|e| xlsx_error("save", e))?;
    debug!("Built workbook '{}': {} rows, {} bytes", sheet_name, rows.len(), bytes.len());
    Ok(bytes)
}

fn xlsx_error(what: &str, e: impl fmt::Display) -> Table2XlsxError {
    Table2XlsxError::Internal(format!("xlsx {what}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{normalize, Record};
    use crate::sheet::read_grid;

    fn sample_table() -> Table {
        let records: Vec<Record> = vec![
            [("Client Name", "Ada & Co"), ("Phone No", "5550100")]
                .into_iter()
                .collect(),
            [("Client Name", " <Bob> "), ("Email", "bob@x.io")]
                .into_iter()
                .collect(),
        ];
        normalize(records, "test").unwrap()
    }

    #[test]
    fn control_characters_still_make_a_readable_workbook() {
        let rows = vec![
            vec!["Name".to_string(), "Note".to_string()],
            vec!["a\u{1}b".to_string(), "bell\u{7} and \u{1f}".to_string()],
        ];
        let bytes = write_workbook("Sheet1", &rows).unwrap();

        let grid = read_grid(&bytes, "control.xlsx", "Sheet1").unwrap();
        assert_eq!(grid.height(), 2);
        assert!(grid.cell(1, 0).starts_with('a'));
        assert!(grid.cell(1, 0).ends_with('b'));
        assert!(grid.cell(1, 1).starts_with("bell"));
    }

    #[test]
    fn empty_strings_leave_blank_cells() {
        let rows = vec![vec!["x".to_string(), String::new(), "z".to_string()]];
        let bytes = write_workbook("Data", &rows).unwrap();
        let grid = read_grid(&bytes, "blank.xlsx", "Data").unwrap();
        assert_eq!(grid.cell(0, 1), "");
        assert_eq!(grid.cell(0, 2), "z");
    }

    #[test]
    fn handle_parse_rejects_traversal() {
        assert!(ArtifactHandle::parse("../etc/passwd").is_none());
        assert!(ArtifactHandle::parse("report.xlsx").is_none());
        assert!(ArtifactHandle::parse("0b7e2f4c-51c1-4b3a-9b8e-6a1b2c3d4e5f.csv").is_none());
        let h = ArtifactHandle::parse("0b7e2f4c-51c1-4b3a-9b8e-6a1b2c3d4e5f.xlsx").unwrap();
        assert_eq!(h.as_str(), "0b7e2f4c-51c1-4b3a-9b8e-6a1b2c3d4e5f.xlsx");
        assert!(ArtifactHandle::parse(ArtifactHandle::generate().as_str()).is_some());
    }

    #[tokio::test]
    async fn written_table_reads_back_with_header_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), Duration::from_secs(60))
            .await
            .unwrap();
        let handle = store.write_table(&sample_table()).await.unwrap();

        let bytes = store.take(Some(&handle)).await.unwrap();
        let grid = read_grid(&bytes, "artifact", OUTPUT_SHEET).unwrap();
        assert_eq!(grid.cell(0, 0), "Client Name");
        assert_eq!(grid.cell(0, 1), "Phone No");
        assert_eq!(grid.cell(0, 2), "Email");
        assert_eq!(grid.cell(1, 0), "Ada & Co");
        assert_eq!(grid.cell(1, 1), "5550100");
        assert_eq!(grid.cell(2, 2), "bob@x.io");
        assert_eq!(grid.height(), 3);
    }

    #[tokio::test]
    async fn each_write_gets_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), Duration::from_secs(60))
            .await
            .unwrap();
        let a = store.write_table(&sample_table()).await.unwrap();
        let b = store.write_table(&sample_table()).await.unwrap();
        assert_ne!(a, b);
        assert!(store.path_of(&a).exists());
        assert!(store.path_of(&b).exists());
    }

    #[tokio::test]
    async fn download_is_once_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), Duration::from_secs(60))
            .await
            .unwrap();
        let handle = store.write_table(&sample_table()).await.unwrap();

        assert!(store.take(Some(&handle)).await.is_ok());
        assert!(!store.path_of(&handle).exists());
        let err = store.take(Some(&handle)).await.unwrap_err();
        assert!(matches!(err, Table2XlsxError::NoArtifact));
    }

    #[tokio::test]
    async fn download_without_handle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), Duration::from_secs(60))
            .await
            .unwrap();
        let err = store.take(None).await.unwrap_err();
        assert!(matches!(err, Table2XlsxError::NoArtifact));
    }

    #[tokio::test]
    async fn sweep_evicts_only_expired_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), Duration::from_secs(3600))
            .await
            .unwrap();
        let old = store.write_table(&sample_table()).await.unwrap();
        let fresh = store.write_table(&sample_table()).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let two_hours_ago = SystemTime::now() - Duration::from_secs(7200);
        std::fs::File::options()
            .write(true)
            .open(store.path_of(&old))
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();

        assert_eq!(store.sweep().await.unwrap(), 1);
        assert!(!store.path_of(&old).exists());
        assert!(store.path_of(&fresh).exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
