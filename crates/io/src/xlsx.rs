// Excel file import (xlsx, xls, xlsb, ods) and export (xlsx only)
//
// Import reads one sheet into a Table: first row is the header, cell values
// become text. Export writes one worksheet per table with a bold header row.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use cardops_recon::model::{Cell, Table};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

/// A named worksheet to export.
#[derive(Debug, Clone, Copy)]
pub struct SheetData<'a> {
    pub name: &'a str,
    pub table: &'a Table,
}

impl<'a> SheetData<'a> {
    pub fn new(name: &'a str, table: &'a Table) -> Self {
        Self { name, table }
    }
}

/// Import the first sheet of a workbook.
pub fn import(path: &Path) -> Result<Table, String> {
    import_sheet(path, None)
}

/// Import a named sheet (or the first one when `sheet` is `None`).
pub fn import_sheet(path: &Path, sheet: Option<&str>) -> Result<Table, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| format!("Sheet '{}' not found (available: {})", name, sheet_names.join(", ")))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| "Excel file contains no sheets".to_string())?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| cell_text(cell).unwrap_or_else(|| format!("Unnamed: {i}")))
            .collect(),
        None => return Err(format!("Sheet '{}' is empty", sheet_name)),
    };

    let mut table = Table::new(columns);
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(cell_text).collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        table.push_row(cells);
    }

    log::debug!(
        "xlsx: {} sheet '{}' → {} rows × {} columns",
        path.display(),
        sheet_name,
        table.len(),
        table.width()
    );
    Ok(table)
}

/// Text form of one calamine cell. Empty cells and empty strings are nulls.
fn cell_text(cell: &Data) -> Cell {
    match cell {
        Data::Empty => None,
        Data::String(s) => (!s.is_empty()).then(|| s.clone()),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Some(format!("{}", *n as i64))
            } else {
                Some(format!("{}", n))
            }
        }
        Data::Int(n) => Some(n.to_string()),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Some(format!("#{:?}", e)),
        Data::DateTime(dt) => Some(serial_to_text(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Render an Excel serial date (1900 system) as `YYYY-MM-DD[ HH:MM:SS]`.
fn serial_to_text(serial: f64) -> String {
    // 9999-12-31 is the last date Excel can represent
    if !(0.0..=2_958_466.0).contains(&serial) {
        return serial.to_string();
    }
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return serial.to_string();
    };
    let seconds = (serial * 86_400.0).round() as i64;
    let dt = epoch + Duration::seconds(seconds);
    if seconds % 86_400 == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Export tables as worksheets of one workbook file.
pub fn export(sheets: &[SheetData<'_>], path: &Path) -> Result<(), String> {
    let mut workbook = build_workbook(sheets)?;
    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))
}

/// Same as [`export`] but returns the file bytes (for mail attachments).
pub fn export_to_buffer(sheets: &[SheetData<'_>]) -> Result<Vec<u8>, String> {
    let mut workbook = build_workbook(sheets)?;
    workbook
        .save_to_buffer()
        .map_err(|e| format!("Failed to build XLSX file: {}", e))
}

fn build_workbook(sheets: &[SheetData<'_>]) -> Result<Workbook, String> {
    if sheets.is_empty() {
        return Err("Nothing to export: no sheets".to_string());
    }
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for sheet in sheets {
        let name: String = sheet.name.chars().take(MAX_SHEET_NAME).collect();
        let worksheet = workbook
            .add_worksheet()
            .set_name(&name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", name, e))?;
        write_table(worksheet, sheet.table, &header)
            .map_err(|e| format!("Failed to write sheet '{}': {}", name, e))?;
    }
    Ok(workbook)
}

/// Worksheet limits, header row included.
const MAX_SHEET_ROWS: usize = 1_048_576;
const MAX_SHEET_COLS: usize = 16_384;

fn write_table(worksheet: &mut Worksheet, table: &Table, header: &Format) -> Result<(), String> {
    if table.width() > MAX_SHEET_COLS {
        return Err(format!("{} columns exceed the sheet limit of {MAX_SHEET_COLS}", table.width()));
    }
    if table.len() >= MAX_SHEET_ROWS {
        return Err(format!("{} rows exceed the sheet limit of {}", table.len(), MAX_SHEET_ROWS - 1));
    }
    let col_index = |col: usize| u16::try_from(col).map_err(|_| format!("column {col} is out of range"));
    let row_index = |row: usize| u32::try_from(row + 1).map_err(|_| format!("row {row} is out of range"));

    for (col, name) in table.columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col_index(col)?, name, header)
            .map_err(|e| e.to_string())?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let row32 = row_index(r)?;
        for (col, cell) in row.iter().enumerate() {
            let Some(value) = cell else { continue };
            let col16 = col_index(col)?;
            match as_number(value) {
                Some(n) => worksheet.write_number(row32, col16, n),
                None => worksheet.write_string(row32, col16, value),
            }
            .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

/// Values that survive a trip through a numeric cell unchanged.
///
/// Leading zeros, long digit strings (phone numbers, ids) and anything
/// non-canonical stay text.
fn as_number(value: &str) -> Option<f64> {
    let digits = value.trim_start_matches('-');
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if digits.is_empty() || value.len() > 9 || leading_zero {
        return None;
    }
    let n: f64 = value.parse().ok()?;
    (n.is_finite() && n.to_string() == value).then_some(n)
}
