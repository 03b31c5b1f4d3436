//! Extraction result assembly: AI reply text → records → one table.
//!
//! Vision models are asked for a bare JSON array of row objects, but they
//! routinely wrap it in a ```` ```json ```` fence anyway. Each unit's reply
//! is fence-stripped and parsed on its own; a unit that fails to parse only
//! loses its own rows. [`assemble_table`] then concatenates the surviving
//! units in input order and normalises them.

use crate::error::{Table2XlsxError, UnitError};
use crate::output::UnitResult;
use crate::record::{normalize, Record, Table};
use crate::sanitize;
use serde_json::Value;
use tracing::{debug, warn};

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Remove a surrounding markdown code fence (```` ```json ```` or bare
/// ```` ``` ````) if present. Text without a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix(JSON_FENCE)
        .or_else(|| trimmed.strip_prefix(FENCE))
    else {
        return trimmed;
    };
    inner.strip_suffix(FENCE).unwrap_or(inner).trim()
}

/// Parse one unit's reply into records.
///
/// The reply must be a JSON array; elements that are not objects are
/// skipped with a warning.
pub fn parse_records(unit: usize, text: &str) -> Result<Vec<Record>, UnitError> {
    if text.trim().is_empty() {
        return Err(UnitError::EmptyResponse { unit });
    }

    let value: Value =
        serde_json::from_str(strip_code_fence(text)).map_err(|e| UnitError::InvalidJson {
            unit,
            detail: e.to_string(),
        })?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(UnitError::NotAnArray {
                unit,
                found: json_kind(&other).to_string(),
            })
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => records.push(
                map.into_iter()
                    .map(|(k, v)| (k, value_to_cell(v)))
                    .collect::<Record>(),
            ),
            other => warn!(
                "Unit {}: skipping row {} ({} is not an object)",
                unit,
                i + 1,
                json_kind(&other)
            ),
        }
    }

    debug!("Unit {}: parsed {} records", unit, records.len());
    Ok(records)
}

/// Accumulates unit outcomes for one batch, in the order they are pushed.
#[derive(Debug, Default)]
pub struct Assembler {
    units: Vec<UnitResult>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a unit's reply text and record the outcome.
    pub fn push_text(&mut self, unit: usize, label: impl Into<String>, text: &str) -> &UnitResult {
        let label = label.into();
        let result = match parse_records(unit, text) {
            Ok(records) => UnitResult::success(unit, label, records),
            Err(e) => UnitResult::failure(unit, label, e),
        };
        self.push(result)
    }

    /// Record an already-built outcome. Failed units are logged and kept so
    /// the caller can report them; they contribute no rows.
    pub fn push(&mut self, result: UnitResult) -> &UnitResult {
        if let Some(ref e) = result.error {
            warn!("Skipping '{}': {}", result.label, e);
        }
        let idx = self.units.len();
        self.units.push(result);
        &self.units[idx]
    }

    pub fn units(&self) -> &[UnitResult] {
        &self.units
    }

    /// Rows collected so far from successful units.
    pub fn record_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.is_ok())
            .map(|u| u.records.len())
            .sum()
    }

    /// Build the table from every successful unit.
    ///
    /// # Errors
    /// [`Table2XlsxError::NoData`] with `context` when nothing was collected.
    pub fn finish(self, context: &str) -> Result<(Table, Vec<UnitResult>), Table2XlsxError> {
        let table = assemble_table(&self.units, context)?;
        Ok((table, self.units))
    }
}

/// Concatenate the records of every successful unit, in unit order, and
/// fold them into a sanitised table.
///
/// # Errors
/// [`Table2XlsxError::NoData`] when no unit contributed a record.
pub fn assemble_table(units: &[UnitResult], context: &str) -> Result<Table, Table2XlsxError> {
    let mut ordered: Vec<&UnitResult> = units.iter().collect();
    ordered.sort_by_key(|u| u.unit);

    let records: Vec<Record> = ordered
        .into_iter()
        .filter(|u| u.error.is_none())
        .flat_map(|u| u.records.iter().cloned())
        .collect();

    let mut table = normalize(records, context)?;
    sanitize::sanitize_ai_table(&mut table);
    Ok(table)
}

/// Render a JSON value as a cell string.
///
/// Integral numbers print without a fractional part so identifiers and phone
/// numbers survive numeric typing by the model.
pub fn value_to_cell(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                    _ => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
