// CSV/TSV import/export

use std::io::Read;
use std::path::Path;

use cardops_recon::model::{Cell, Table};

/// Import a delimited file. The delimiter is sniffed; the first record is the header.
pub fn import(path: &Path) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    log::debug!("csv: {} sniffed delimiter {:?}", path.display(), delimiter as char);
    import_from_string(&content, delimiter)
}

pub fn import_with_delimiter(path: &Path, delimiter: u8) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, delimiter)
}

/// Delimiters seen in MIS and campaign extracts, in preference order.
const DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Pick the delimiter that splits the header into the most columns with the
/// data lines agreeing on that width. Ties go to the earlier delimiter in
/// [`DELIMITERS`]; comma when nothing splits the header.
pub fn sniff_delimiter(content: &str) -> u8 {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty()).take(10);
    let Some(header) = lines.next() else {
        return b',';
    };
    let body: Vec<&str> = lines.collect();

    DELIMITERS
        .iter()
        .filter_map(|&delim| {
            let width = field_count(header, delim);
            if width < 2 {
                return None;
            }
            let agreeing = body.iter().filter(|line| field_count(line, delim) == width).count();
            Some((delim, (agreeing + 1) * width))
        })
        .fold((b',', 0), |best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .0
}

fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |record| record.len())
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel-exported CSVs are usually Windows-1252
            log::debug!("csv: {} is not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Parse delimited text. Empty fields become nulls; ragged rows are padded.
pub fn import_from_string(content: &str, delimiter: u8) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let columns: Vec<String> = match records.next() {
        Some(header) => header.map_err(|e| e.to_string())?.iter().map(str::to_string).collect(),
        None => return Err("CSV file is empty".to_string()),
    };

    let mut table = Table::new(columns);
    for result in records {
        let record = result.map_err(|e| e.to_string())?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: Vec<Cell> = record
            .iter()
            .map(|field| if field.is_empty() { None } else { Some(field.to_string()) })
            .collect();
        table.push_row(row);
    }

    Ok(table)
}

pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    export_with_delimiter(table, path, b',')
}

pub fn export_tsv(table: &Table, path: &Path) -> Result<(), String> {
    export_with_delimiter(table, path, b'\t')
}

fn export_with_delimiter(table: &Table, path: &Path, delimiter: u8) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| e.to_string())?;
    write_table(&mut writer, table)?;
    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}

/// Render a table as comma-separated text, header first. Nulls are empty fields.
pub fn to_string(table: &Table) -> Result<String, String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    write_table(&mut writer, table)?;
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

fn write_table<W: std::io::Write>(writer: &mut csv::Writer<W>, table: &Table) -> Result<(), String> {
    writer.write_record(&table.columns).map_err(|e| e.to_string())?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}
