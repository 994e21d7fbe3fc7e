// JSON export

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use cardops_recon::model::Table;
use serde_json::{Map, Value};

/// Records orientation: one object per row keyed by column name, nulls as `null`.
pub fn to_records(table: &Table) -> Value {
    let records = table
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::with_capacity(table.width());
            for (name, cell) in table.columns.iter().zip(row) {
                let value = match cell {
                    Some(s) => Value::String(s.clone()),
                    None => Value::Null,
                };
                obj.insert(name.clone(), value);
            }
            Value::Object(obj)
        })
        .collect();
    Value::Array(records)
}

pub fn to_string(table: &Table) -> Result<String, String> {
    serde_json::to_string_pretty(&to_records(table)).map_err(|e| e.to_string())
}

pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &to_records(table)).map_err(|e| e.to_string())?;
    Ok(())
}
