//! Extraction output types: the assembled table plus per-unit outcomes.

use crate::error::UnitError;
use crate::record::{Record, Table};
use serde::{Deserialize, Serialize};

/// The result of one extraction operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The normalised, sanitised table. Never empty.
    pub table: Table,
    /// One entry per AI unit, in unit order. Empty for spreadsheet input.
    pub units: Vec<UnitResult>,
    pub stats: ExtractionStats,
}

/// Outcome of one unit (an image, a PDF page, or a screenshot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitResult {
    /// 1-based position in the batch.
    pub unit: usize,
    /// File name, URL, or "page N".
    pub label: String,
    /// Rows parsed from the AI reply. Empty when `error` is set.
    pub records: Vec<Record>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub error: Option<UnitError>,
}

impl UnitResult {
    pub fn success(unit: usize, label: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            unit,
            label: label.into(),
            records,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn failure(unit: usize, label: impl Into<String>, error: UnitError) -> Self {
        Self {
            unit,
            label: label.into(),
            records: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters for an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_units: usize,
    pub processed_units: usize,
    pub failed_units: usize,
    /// Rows in the final table.
    pub total_records: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl ExtractionStats {
    /// Summarise unit outcomes against the final table.
    pub fn from_units(units: &[UnitResult], table: &Table, total_duration_ms: u64) -> Self {
        let processed_units = units.iter().filter(|u| u.is_ok()).count();
        Self {
            total_units: units.len(),
            processed_units,
            failed_units: units.len() - processed_units,
            total_records: table.len(),
            total_input_tokens: units.iter().map(|u| u.input_tokens as u64).sum(),
            total_output_tokens: units.iter().map(|u| u.output_tokens as u64).sum(),
            total_duration_ms,
        }
    }
}
