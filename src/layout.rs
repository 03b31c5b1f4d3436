//! Positional decoders for the two known spreadsheet layouts.
//!
//! Both decoders work on a [`Grid`] of string cells with no header row: row 0
//! is data. The offsets are tied to one known source layout; a reformatted
//! sheet decodes to wrong or empty output rather than a structural error,
//! except where the tabular region clearly has data but too few columns
//! ([`Table2XlsxError::LayoutMismatch`]).
//!
//! ```text
//! CRM export (Sheet2)
//!
//!   col 0            col 2 ........ col 9
//!   ┌──────────┐
//!   │ token    │  rows 0..1535: column 0 read as a flat token stream,
//!   │ token    │  9 tokens per record
//!   │ …        │
//!   ├──────────┼───────────────────────┐
//!   │          │ Client Name … Contact │  rows 1535..1668: one record per row
//!   │          │ …                     │
//!   └──────────┴───────────────────────┘
//! ```

use crate::config::{layout_bounds::PREVIEW_SENTINEL, LayoutBounds, SheetLayout};
use crate::error::Table2XlsxError;
use crate::record::{Record, Table};
use crate::sanitize;
use std::ops::Range;
use tracing::{debug, info};

/// Chunk position → header index for one CRM export block. Position 1 is
/// not part of the record.
const BLOCK_FIELD_POSITIONS: [(usize, usize); 8] =
    [(0, 0), (2, 1), (3, 2), (4, 3), (5, 4), (6, 5), (7, 6), (8, 7)];

/// A 2-D sheet of string cells. Empty cells are `""`; rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell value, `""` outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Clamp a row range to the grid.
    fn clamp_rows(&self, rows: &Range<usize>) -> Range<usize> {
        let end = rows.end.min(self.height());
        rows.start.min(end)..end
    }
}

impl<S: Into<String>> FromIterator<Vec<S>> for Grid {
    fn from_iter<I: IntoIterator<Item = Vec<S>>>(iter: I) -> Self {
        Grid::new(
            iter.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

/// Decode `grid` with the selected layout and apply the layout's sanitiser.
///
/// # Errors
/// * [`Table2XlsxError::NoData`] — the decode produced no records.
/// * [`Table2XlsxError::LayoutMismatch`] — the CRM tabular region holds data
///   but the sheet is too narrow to slice it.
/// * [`Table2XlsxError::InvalidConfig`] — `bounds` cannot describe a sheet.
pub fn decode(
    grid: &Grid,
    layout: SheetLayout,
    bounds: &LayoutBounds,
) -> Result<Table, Table2XlsxError> {
    bounds.validate()?;
    let records = match layout {
        SheetLayout::ContactList => decode_contact_rows(grid),
        SheetLayout::CrmExport => {
            let mut records = decode_blocks(grid, bounds);
            let block_count = records.len();
            records.extend(decode_structured_region(grid, bounds)?);
            debug!(
                "CRM export: {} block records, {} region records",
                block_count,
                records.len() - block_count
            );
            records
        }
    };

    let mut table = Table::from_declared(
        &layout.headers(),
        records,
        "no data was processed from the sheet",
    )?;
    match layout {
        SheetLayout::ContactList => sanitize::sanitize_contact_list(&mut table),
        SheetLayout::CrmExport => sanitize::sanitize_crm_export(&mut table),
    }
    info!("Decoded {} layout: {} records", layout, table.len());
    Ok(table)
}

/// Contact list: one record per row built from the row's non-empty cells.
fn decode_contact_rows(grid: &Grid) -> Vec<Record> {
    let headers = SheetLayout::ContactList.headers();
    grid.rows()
        .filter_map(|row| {
            let values: Vec<&str> = row
                .iter()
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .collect();
            match values.first() {
                None => None,
                Some(&first) if first == PREVIEW_SENTINEL => None,
                Some(_) => Some(
                    headers
                        .iter()
                        .enumerate()
                        .map(|(i, h)| (*h, values.get(i).copied().unwrap_or("")))
                        .collect::<Record>(),
                ),
            }
        })
        .collect()
}

/// CRM export phase 1: column 0 tokens consumed in fixed-stride chunks.
fn decode_blocks(grid: &Grid, bounds: &LayoutBounds) -> Vec<Record> {
    let headers = SheetLayout::CrmExport.headers();
    let tokens: Vec<&str> = grid
        .clamp_rows(&bounds.block_rows)
        .map(|r| grid.cell(r, 0))
        .filter(|v| !v.is_empty())
        .collect();

    let dropped = tokens.len() % bounds.block_stride;
    if dropped > 0 {
        debug!("CRM export: dropping {} trailing block tokens", dropped);
    }

    tokens
        .chunks_exact(bounds.block_stride)
        .map(|chunk| {
            BLOCK_FIELD_POSITIONS
                .iter()
                .map(|&(pos, h)| (headers[h], chunk[pos]))
                .collect::<Record>()
        })
        .collect()
}

/// CRM export phase 2: the tabular region, one record per non-blank row.
fn decode_structured_region(
    grid: &Grid,
    bounds: &LayoutBounds,
) -> Result<Vec<Record>, Table2XlsxError> {
    let headers = SheetLayout::CrmExport.headers();
    let rows = grid.clamp_rows(&bounds.structured_rows);

    if grid.width() < bounds.structured_min_width() {
        let has_data = rows
            .clone()
            .any(|r| (0..grid.width()).any(|c| !grid.cell(r, c).is_empty()));
        if has_data {
            return Err(Table2XlsxError::LayoutMismatch {
                layout: SheetLayout::CrmExport.to_string(),
                detail: format!(
                    "rows {}..{} hold data but the sheet has {} columns; {} are needed",
                    rows.start,
                    rows.end,
                    grid.width(),
                    bounds.structured_min_width()
                ),
            });
        }
        return Ok(Vec::new());
    }

    Ok(rows
        .filter(|&r| !grid.cell(r, bounds.structured_cols.start).is_empty())
        .map(|r| {
            headers
                .iter()
                .zip(bounds.structured_cols.clone())
                .map(|(h, c)| (*h, grid.cell(r, c)))
                .collect::<Record>()
        })
        .collect())
}
