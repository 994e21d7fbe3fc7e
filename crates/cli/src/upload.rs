// mis upload / mis info / campaign load

use std::path::Path;

use cardops_recon::Table;
use cardops_store::{UploadMode, UploadOptions, UploadReport};
use serde_json::json;

use crate::{CliError, Context};

/// Extensions accepted for MIS extracts.
const UPLOAD_EXTENSIONS: &[&str] = &["xlsx", "csv"];

pub(crate) fn cmd_mis_upload(ctx: &Context, file: &Path, replace: bool, actor: &str, json: bool) -> Result<(), CliError> {
    let table = read_extract(file)?;
    let options = UploadOptions {
        mode: if replace { UploadMode::Replace } else { UploadMode::Upsert },
        actor: actor.to_string(),
    };
    let mut store = ctx.open_store()?;
    let report = store.upload_mis(table, &options)?;

    if json {
        let text = serde_json::to_string_pretty(&report_json(&report))
            .map_err(|e| CliError::general(e.to_string()))?;
        println!("{text}");
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Read an .xlsx or .csv extract; anything else is refused.
fn read_extract(file: &Path) -> Result<Table, CliError> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CliError::io(format!("{}: unsupported file format", file.display()))
            .with_hint("upload an .xlsx or .csv extract"));
    }
    if !file.exists() {
        return Err(CliError::io(format!("file not found: {}", file.display())));
    }
    cardops_io::import(file).map_err(CliError::io)
}

fn report_json(report: &UploadReport) -> serde_json::Value {
    json!({
        "table": report.table,
        "created_table": report.created_table,
        "rows_in_file": report.rows_in_file,
        "columns": report.columns,
        "ignored_columns": report.ignored_columns,
        "coerced_dates": report.coerced_dates,
        "duplicates_removed": report.duplicates_removed,
        "blank_ids": report.blank_ids,
        "new_records": report.new_records,
        "updated_records": report.updated_records,
        "total_rows": report.total_rows,
        "audit_logged": report.audit_logged,
    })
}

fn print_report(report: &UploadReport) {
    let action = if report.created_table { "created" } else { "updated" };
    println!("{} {} from {} rows", action, report.table, report.rows_in_file);
    println!("  new records:      {}", report.new_records);
    println!("  updated records:  {}", report.updated_records);
    if report.duplicates_removed > 0 {
        println!("  duplicate ids:    {} (last row kept)", report.duplicates_removed);
    }
    if report.blank_ids > 0 {
        println!("  blank ids:        {} (skipped)", report.blank_ids);
    }
    if !report.ignored_columns.is_empty() {
        println!("  ignored columns:  {}", report.ignored_columns.join(", "));
    }
    for (column, n) in report.coerced_dates.iter().filter(|(_, n)| **n > 0) {
        println!("  invalid dates:    {n} in {column} (set to null)");
    }
    println!("  total rows:       {}", report.total_rows);
    if !report.audit_logged {
        eprintln!("warning: upload succeeded but the update log could not be written");
    }
}

pub(crate) fn cmd_mis_info(ctx: &Context, json: bool) -> Result<(), CliError> {
    let info = ctx.open_store()?.mis_info()?;

    if json {
        let text = serde_json::to_string_pretty(&json!({
            "table": info.table,
            "exists": info.exists,
            "row_count": info.row_count,
            "last_updated": info.last_updated,
        }))
        .map_err(|e| CliError::general(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    if !info.exists {
        println!("{}: no data loaded", info.table);
        return Ok(());
    }
    println!("{}: {} rows", info.table, info.row_count);
    println!("last updated: {}", info.last_updated.as_deref().unwrap_or("never"));
    Ok(())
}

pub(crate) fn cmd_campaign_load(ctx: &Context, file: &Path, actor: &str) -> Result<(), CliError> {
    let table = read_extract(file)?;
    let mut store = ctx.open_store()?;
    let total = store.replace_campaign(table, actor)?;
    println!("replaced {} with {} rows", store.tables().campaign, total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_xlsx_and_csv_extracts() {
        let err = read_extract(Path::new("MIS.json")).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_IO);
        assert!(err.message.contains("unsupported"));
        let err = read_extract(Path::new("missing.csv")).unwrap_err();
        assert!(err.message.contains("not found"));
    }
}
