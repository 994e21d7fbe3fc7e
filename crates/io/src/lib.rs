// File I/O: CSV, Excel and JSON for cardops tables

pub mod csv;
pub mod json;
pub mod xlsx;

use std::path::Path;

use cardops_recon::model::Table;

/// File formats a table can be read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Excel,
    Json,
}

impl FileFormat {
    /// Format from the file extension, case-insensitive.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" => Ok(Self::Tsv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Self::Excel),
            "json" => Ok(Self::Json),
            "" => Err(format!("{}: file has no extension", path.display())),
            other => Err(format!("{}: unsupported file format '.{other}'", path.display())),
        }
    }
}

/// Load a table from a CSV/TSV or Excel file, picked by extension.
pub fn import(path: &Path) -> Result<Table, String> {
    let table = match FileFormat::from_path(path)? {
        FileFormat::Csv => csv::import(path)?,
        FileFormat::Tsv => csv::import_with_delimiter(path, b'\t')?,
        FileFormat::Excel => xlsx::import(path)?,
        FileFormat::Json => return Err(format!("{}: JSON is an export-only format", path.display())),
    };
    log::info!("loaded {} rows × {} columns from {}", table.len(), table.width(), path.display());
    Ok(table)
}

/// Write a single table, format picked by extension. Excel output gets one
/// sheet named `sheet_name`.
pub fn export(table: &Table, path: &Path, sheet_name: &str) -> Result<(), String> {
    match FileFormat::from_path(path)? {
        FileFormat::Csv => csv::export(table, path),
        FileFormat::Tsv => csv::export_tsv(table, path),
        FileFormat::Excel => xlsx::export(&[xlsx::SheetData::new(sheet_name, table)], path),
        FileFormat::Json => json::export(table, path),
    }
}
