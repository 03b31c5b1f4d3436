//! Spreadsheet reading: xlsx bytes → [`Grid`].
//!
//! The grid is anchored at absolute cell A1 so the fixed layout offsets line
//! up with sheet rows even when the sheet starts with blank rows or columns.

use crate::error::Table2XlsxError;
use crate::layout::Grid;
use calamine::{Data, Reader, Xlsx, XlsxError};
use std::io::Cursor;
use tracing::debug;

/// Open an in-memory xlsx workbook and read `sheet` into a [`Grid`].
///
/// `name` is only used in error messages.
pub fn read_grid(bytes: &[u8], name: &str, sheet: &str) -> Result<Grid, Table2XlsxError> {
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes)).map_err(
        |e: XlsxError| Table2XlsxError::InvalidSpreadsheet {
            name: name.to_string(),
            detail: e.to_string(),
        },
    )?;

    if !workbook.sheet_names().iter().any(|s| s == sheet) {
        return Err(Table2XlsxError::SheetNotFound {
            name: name.to_string(),
            sheet: sheet.to_string(),
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| Table2XlsxError::InvalidSpreadsheet {
            name: name.to_string(),
            detail: format!("sheet '{sheet}': {e}"),
        })?;

    let Some((last_row, last_col)) = range.end() else {
        debug!("Sheet '{}' is empty", sheet);
        return Ok(Grid::default());
    };

    let rows = (0..=last_row)
        .map(|r| {
            (0..=last_col)
                .map(|c| range.get_value((r, c)).map(cell_as_string).unwrap_or_default())
                .collect()
        })
        .collect();

    debug!(
        "Read sheet '{}': {} rows × {} columns",
        sheet,
        last_row + 1,
        last_col + 1
    );
    Ok(Grid::new(rows))
}

/// Timestamp layout of date cells, matching a string-typed read.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a cell the way a string-typed spreadsheet read would show it.
fn cell_as_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => ts.format(DATETIME_FORMAT).to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.replacen('T', " ", 1),
        other => format!("{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::write_workbook;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn reads_named_sheet_into_grid() {
        let bytes = write_workbook("Sheet2", &rows(&[&["a", "", "c"], &["", "e"]])).unwrap();
        let grid = read_grid(&bytes, "fixture.xlsx", "Sheet2").unwrap();
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.cell(0, 0), "a");
        assert_eq!(grid.cell(0, 1), "");
        assert_eq!(grid.cell(0, 2), "c");
        assert_eq!(grid.cell(1, 1), "e");
    }

    #[test]
    fn leading_blank_rows_keep_their_offsets() {
        let bytes = write_workbook("Sheet1", &rows(&[&[], &[], &["", "x"]])).unwrap();
        let grid = read_grid(&bytes, "fixture.xlsx", "Sheet1").unwrap();
        assert_eq!(grid.cell(2, 1), "x");
        assert_eq!(grid.height(), 3);
    }

    #[test]
    fn missing_sheet_is_reported() {
        let bytes = write_workbook("Sheet1", &rows(&[&["a"]])).unwrap();
        let err = read_grid(&bytes, "fixture.xlsx", "Sheet2").unwrap_err();
        assert!(matches!(err, Table2XlsxError::SheetNotFound { .. }), "got {err:?}");
    }

    #[test]
    fn garbage_is_not_a_spreadsheet() {
        let err = read_grid(b"not a zip at all", "junk.xlsx", "Sheet1").unwrap_err();
        assert!(matches!(err, Table2XlsxError::InvalidSpreadsheet { .. }));
    }

    #[test]
    fn integral_floats_print_without_fraction() {
        assert_eq!(cell_as_string(&Data::Float(9876543210.0)), "9876543210");
        assert_eq!(cell_as_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_as_string(&Data::String("  x ".into())), "x");
        assert_eq!(cell_as_string(&Data::Empty), "");
    }

    #[test]
    fn date_cells_read_as_timestamps() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Sheet1").unwrap();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let date = ExcelDateTime::from_ymd(2024, 3, 1).unwrap();
        sheet.write_string(0, 0, "Ada").unwrap();
        sheet
            .write_datetime_with_format(0, 5, &date, &date_format)
            .unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let grid = read_grid(&bytes, "dates.xlsx", "Sheet1").unwrap();
        assert_eq!(grid.cell(0, 0), "Ada");
        assert_eq!(grid.cell(0, 5), "2024-03-01 00:00:00");
    }

    #[test]
    fn iso_date_strings_drop_the_t() {
        let cell = Data::DateTimeIso("2024-03-01T10:30:00".into());
        assert_eq!(cell_as_string(&cell), "2024-03-01 10:30:00");
    }
}
