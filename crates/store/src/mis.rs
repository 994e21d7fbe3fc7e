//! MIS bulk loads.
//!
//! An upload either upserts by application reference (rows whose id is in the
//! file are replaced, others kept) or replaces the table wholesale. Either way
//! the write happens in a single transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use cardops_recon::columns::APPLICATION_REFERENCE_NUMBER;
use cardops_recon::dates::{is_date_like_header, normalize_datetime};
use cardops_recon::model::{non_empty, Table};

use crate::error::StoreError;
use crate::{insert_rows, quote_ident, recreate_table, table_columns, table_exists, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Insert new ids, replace existing ones.
    #[default]
    Upsert,
    /// Drop the table and load the file as its only content.
    Replace,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub mode: UploadMode,
    /// Recorded as `updated_by` in the audit log.
    pub actor: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self { mode: UploadMode::Upsert, actor: "cardops".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadReport {
    pub table: String,
    pub created_table: bool,
    pub rows_in_file: usize,
    /// Columns actually written, in file order.
    pub columns: Vec<String>,
    /// File columns the existing table does not have.
    pub ignored_columns: Vec<String>,
    /// Date column → number of non-empty values that did not parse.
    pub coerced_dates: BTreeMap<String, usize>,
    /// Rows dropped because a later row had the same id.
    pub duplicates_removed: usize,
    /// Rows dropped because the id was blank.
    pub blank_ids: usize,
    pub new_records: usize,
    pub updated_records: usize,
    /// Table size after the load.
    pub total_rows: usize,
    pub audit_logged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisInfo {
    pub table: String,
    pub exists: bool,
    pub row_count: usize,
    pub last_updated: Option<String>,
}

impl Store {
    /// Load a MIS extract into the MIS table.
    pub fn upload_mis(&mut self, mut file: Table, options: &UploadOptions) -> Result<UploadReport, StoreError> {
        let table_name = self.tables().mis.clone();
        file.trim_headers();

        let mut report = UploadReport {
            table: table_name.clone(),
            rows_in_file: file.len(),
            ..UploadReport::default()
        };

        let exists = table_exists(self.connection(), &table_name)?;
        let file = if exists && options.mode == UploadMode::Upsert {
            let existing: HashSet<String> = table_columns(self.connection(), &table_name)?
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            let (keep, ignored): (Vec<usize>, Vec<usize>) =
                (0..file.width()).partition(|&i| existing.contains(&file.columns[i]));
            report.ignored_columns = ignored.iter().map(|&i| file.columns[i].clone()).collect();
            if keep.is_empty() {
                return Err(StoreError::NoCommonColumns { table: table_name });
            }
            file.select(&keep)
        } else {
            file
        };

        let id_col = file.column_index(APPLICATION_REFERENCE_NUMBER).ok_or_else(|| {
            StoreError::MissingColumn { column: APPLICATION_REFERENCE_NUMBER.to_string() }
        })?;

        let mut file = file;
        report.coerced_dates = coerce_dates(&mut file);
        let (file, duplicates, blank) = dedup_last_wins(&file, id_col);
        report.duplicates_removed = duplicates;
        report.blank_ids = blank;
        report.columns = file.columns.clone();
        if file.is_empty() {
            return Err(StoreError::NoRows);
        }

        let upsert = exists && options.mode == UploadMode::Upsert;
        let existing_ids = if upsert { self.existing_ids(&table_name)? } else { HashSet::new() };
        report.updated_records = file
            .column_values(id_col)
            .flatten()
            .filter(|id| existing_ids.contains(*id))
            .count();
        report.new_records = file.len() - report.updated_records;
        report.created_table = !exists || options.mode == UploadMode::Replace;

        if upsert {
            self.upsert_rows(&table_name, &file)?;
        } else {
            self.write_table(&table_name, &file)?;
        }

        report.total_rows = self.row_count(&table_name)?;
        let notes = format!("New: {}, Updated: {}", report.new_records, report.updated_records);
        report.audit_logged = match self.log_update(&table_name, file.len(), &options.actor, &notes) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("mis upload: could not write audit log: {e}");
                false
            }
        };

        log::info!(
            "mis upload: {} rows into {table_name} ({notes}), table now {} rows",
            file.len(),
            report.total_rows
        );
        Ok(report)
    }

    /// Temp table → delete matching ids → insert → drop temp, all or nothing.
    fn upsert_rows(&mut self, table_name: &str, file: &Table) -> Result<(), StoreError> {
        let temp = format!("{table_name}_temp");
        let cols: Vec<String> = file.columns.iter().map(|c| quote_ident(c)).collect();
        let col_list = cols.join(", ");
        let id = quote_ident(APPLICATION_REFERENCE_NUMBER);

        let tx = self.conn.transaction()?;
        recreate_table(&tx, &temp, &file.columns)?;
        insert_rows(&tx, &temp, &file.columns, &file.rows)?;
        tx.execute_batch(&format!(
            "DELETE FROM {main} WHERE {id} IN (SELECT {id} FROM {temp});
             INSERT INTO {main} ({col_list}) SELECT {col_list} FROM {temp};
             DROP TABLE {temp};",
            main = quote_ident(table_name),
            temp = quote_ident(&temp),
        ))?;
        tx.commit()?;
        Ok(())
    }

    fn existing_ids(&self, table_name: &str) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM {}",
            quote_ident(APPLICATION_REFERENCE_NUMBER),
            quote_ident(table_name)
        ))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .filter_map(|r| r.transpose())
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Row count and last load time of the MIS table.
    pub fn mis_info(&self) -> Result<MisInfo, StoreError> {
        let table = self.tables().mis.clone();
        let exists = self.table_exists(&table)?;
        let row_count = if exists { self.row_count(&table)? } else { 0 };
        let last_updated = self.last_updated(&table)?;
        Ok(MisInfo { table, exists, row_count, last_updated })
    }

    pub fn load_mis(&self) -> Result<Table, StoreError> {
        let mut table = self.read_table(&self.tables().mis)?;
        table.trim_headers();
        Ok(table)
    }
}

/// Re-render date-like columns canonically; count values that had to be nulled.
fn coerce_dates(table: &mut Table) -> BTreeMap<String, usize> {
    let mut coerced = BTreeMap::new();
    let date_cols: Vec<usize> = (0..table.width())
        .filter(|&i| is_date_like_header(&table.columns[i]))
        .collect();
    for col in date_cols {
        let mut lost = 0usize;
        table.map_column(col, |v| {
            let parsed = normalize_datetime(v);
            if parsed.is_none() && non_empty(v).is_some() {
                lost += 1;
            }
            parsed
        });
        if lost > 0 {
            log::warn!("mis upload: {lost} invalid values in '{}' set to null", table.columns[col]);
        }
        coerced.insert(table.columns[col].clone(), lost);
    }
    coerced
}

/// Keep the last row for each id, in the order those rows appear.
/// Returns (table, duplicates dropped, blank ids dropped).
fn dedup_last_wins(table: &Table, id_col: usize) -> (Table, usize, usize) {
    let mut last: HashMap<&str, usize> = HashMap::new();
    let mut blank = 0usize;
    for (row, id) in table.column_values(id_col).enumerate() {
        match non_empty(id) {
            Some(id) => {
                last.insert(id, row);
            }
            None => blank += 1,
        }
    }
    let keep: HashSet<usize> = last.values().copied().collect();
    let duplicates = table.len() - blank - keep.len();
    (table.filter_rows(|row| keep.contains(&row)), duplicates, blank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TableNames;

    fn cell(s: &str) -> Option<String> {
        if s.is_empty() { None } else { Some(s.to_string()) }
    }

    fn file(rows: &[(&str, &str, &str)]) -> Table {
        Table::from_rows(
            vec![" APPLICATION_REFERENCE_NUMBER ".into(), "LC2_CODE".into(), "CREATION_DATE_TIME".into()],
            rows.iter().map(|(a, b, c)| vec![cell(a), cell(b), cell(c)]).collect(),
        )
    }

    #[test]
    fn dedup_keeps_last_occurrence() {
        let t = Table::from_rows(
            vec!["id".into(), "v".into()],
            vec![
                vec![cell("A"), cell("1")],
                vec![cell("B"), cell("2")],
                vec![cell("A"), cell("3")],
                vec![None, cell("4")],
            ],
        );
        let (out, dups, blank) = dedup_last_wins(&t, 0);
        assert_eq!(dups, 1);
        assert_eq!(blank, 1);
        assert_eq!(out.rows, vec![vec![cell("B"), cell("2")], vec![cell("A"), cell("3")]]);
    }

    #[test]
    fn date_columns_are_normalized_and_counted() {
        let mut t = file(&[("A", "x", "05/03/2024 10:00"), ("B", "y", "not a date"), ("C", "z", "")]);
        t.trim_headers();
        let coerced = coerce_dates(&mut t);
        assert_eq!(coerced.get("CREATION_DATE_TIME"), Some(&1));
        assert_eq!(t.get(0, 2), Some("2024-03-05 10:00:00"));
        assert_eq!(t.get(1, 2), None);
    }

    #[test]
    fn first_upload_creates_table() {
        let mut store = Store::open_in_memory(TableNames::default()).unwrap();
        let report = store
            .upload_mis(file(&[("A1", "CG1", "2024-01-01"), ("A2", "CG2", "")]), &UploadOptions::default())
            .unwrap();
        assert!(report.created_table);
        assert_eq!(report.new_records, 2);
        assert_eq!(report.total_rows, 2);
        assert!(report.audit_logged);
        assert_eq!(report.columns[0], "APPLICATION_REFERENCE_NUMBER");
    }

    #[test]
    fn header_only_file_leaves_table_untouched() {
        let mut store = Store::open_in_memory(TableNames::default()).unwrap();
        store
            .upload_mis(file(&[("A1", "CG1", ""), ("A2", "CG2", "")]), &UploadOptions::default())
            .unwrap();

        let replace = UploadOptions { mode: UploadMode::Replace, ..UploadOptions::default() };
        assert_eq!(store.upload_mis(file(&[]), &replace), Err(StoreError::NoRows));
        assert_eq!(store.upload_mis(file(&[("", "CG3", "")]), &replace), Err(StoreError::NoRows));
        assert_eq!(store.row_count("HDFC_MIS_Data").unwrap(), 2);
    }

    #[test]
    fn audit_log_counts_rows_in_this_upload() {
        let mut store = Store::open_in_memory(TableNames::default()).unwrap();
        let opts = UploadOptions::default();
        store
            .upload_mis(file(&[("A1", "CG1", ""), ("A2", "CG2", ""), ("A3", "CG3", "")]), &opts)
            .unwrap();
        let report = store.upload_mis(file(&[("A4", "CG4", ""), ("A4", "CG5", "")]), &opts).unwrap();
        assert_eq!(report.total_rows, 4);

        let counts: Vec<i64> = store
            .connection()
            .prepare("SELECT record_count FROM \"MIS_Update_Log\" ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(counts, vec![3, 1]);
    }

    #[test]
    fn missing_id_column_is_rejected() {
        let mut store = Store::open_in_memory(TableNames::default()).unwrap();
        let t = Table::from_rows(vec!["LC2_CODE".into()], vec![vec![cell("CG1")]]);
        assert_eq!(
            store.upload_mis(t, &UploadOptions::default()),
            Err(StoreError::MissingColumn { column: "APPLICATION_REFERENCE_NUMBER".into() })
        );
    }
}
