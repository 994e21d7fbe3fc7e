//! `cardops-store`: SQLite persistence for MIS and campaign data.
//!
//! All user tables are stored with TEXT columns; values travel as
//! [`cardops_recon::Table`] cells. One short-lived connection per operation.

pub mod campaign;
pub mod console;
pub mod error;
pub mod mis;

use std::path::Path;

use cardops_recon::model::{Cell, Table};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};

pub use console::{is_safe_query, ColumnInfo};
pub use error::StoreError;
pub use mis::{MisInfo, UploadMode, UploadOptions, UploadReport};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "MIS_Update_Log" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL,      -- YYYY-MM-DD HH:MM:SS, local time
    updated_by TEXT NOT NULL,
    notes TEXT
);
"#;

/// Names of the tables the store reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub mis: String,
    pub campaign: String,
    pub update_log: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            mis: "HDFC_MIS_Data".to_string(),
            campaign: "Campaign_Data".to_string(),
            update_log: "MIS_Update_Log".to_string(),
        }
    }
}

pub struct Store {
    conn: Connection,
    tables: TableNames,
}

impl Store {
    /// Open (creating if needed) the database file and its audit table.
    pub fn open(path: &Path, tables: TableNames) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("cannot create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        log::debug!("store: opened {}", path.display());
        Self::init(conn, tables)
    }

    pub fn open_in_memory(tables: TableNames) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, tables)
    }

    fn init(conn: Connection, tables: TableNames) -> Result<Self, StoreError> {
        let schema = SCHEMA.replace("\"MIS_Update_Log\"", &quote_ident(&tables.update_log));
        conn.execute_batch(&schema)?;
        Ok(Self { conn, tables })
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        table_exists(&self.conn, name)
    }

    /// Every row of a table, columns in declaration order.
    pub fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        if !self.table_exists(name)? {
            return Err(StoreError::TableNotFound { table: name.to_string() });
        }
        query_table(&self.conn, &format!("SELECT * FROM {}", quote_ident(name)), [])
    }

    /// Replace a table wholesale with `table`'s columns (all TEXT) and rows.
    pub fn write_table(&mut self, name: &str, table: &Table) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        recreate_table(&tx, name, &table.columns)?;
        insert_rows(&tx, name, &table.columns, &table.rows)?;
        tx.commit()?;
        log::info!("store: wrote {} rows to {name}", table.len());
        Ok(())
    }

    pub fn row_count(&self, name: &str) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(name)), [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Append an audit record for a load into `table_name`.
    pub fn log_update(
        &self,
        table_name: &str,
        record_count: usize,
        updated_by: &str,
        notes: &str,
    ) -> Result<(), StoreError> {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.conn.execute(
            &format!(
                "INSERT INTO {} (table_name, record_count, updated_at, updated_by, notes) VALUES (?1, ?2, ?3, ?4, ?5)",
                quote_ident(&self.tables.update_log)
            ),
            params![table_name, record_count as i64, now, updated_by, notes],
        )?;
        Ok(())
    }

    /// Latest audit timestamp for `table_name`, if it was ever loaded.
    pub fn last_updated(&self, table_name: &str) -> Result<Option<String>, StoreError> {
        let latest: Option<String> = self.conn.query_row(
            &format!(
                "SELECT MAX(updated_at) FROM {} WHERE table_name = ?1",
                quote_ident(&self.tables.update_log)
            ),
            params![table_name],
            |r| r.get(0),
        )?;
        Ok(latest)
    }
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

pub(crate) fn recreate_table(conn: &Connection, name: &str, columns: &[String]) -> Result<(), StoreError> {
    let defs: Vec<String> = columns.iter().map(|c| format!("{} TEXT", quote_ident(c))).collect();
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} ({defs});",
        name = quote_ident(name),
        defs = defs.join(", ")
    ))?;
    Ok(())
}

pub(crate) fn insert_rows(
    conn: &Connection,
    name: &str,
    columns: &[String],
    rows: &[Vec<Cell>],
) -> Result<(), StoreError> {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(name),
        cols.join(", "),
        placeholders.join(", ")
    ))?;
    for row in rows {
        stmt.execute(rusqlite::params_from_iter(row.iter()))?;
    }
    Ok(())
}

/// Run a statement and collect every value as text. NULL stays null.
pub(crate) fn query_table<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Table, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();
    let mut table = Table::new(columns);

    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(value_text(row.get_ref(i)?));
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn value_text(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Some(format!("{}", n as i64))
            } else {
                Some(format!("{}", n))
            }
        }
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}

/// Declared columns of an existing table, in order.
pub(crate) fn table_columns(conn: &Connection, name: &str) -> Result<Vec<(String, String)>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
    let cols = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            vec!["seqId".into(), "phoneNo".into()],
            vec![vec![Some("1".into()), None], vec![Some("2".into()), Some("98".into())]],
        )
    }

    #[test]
    fn write_then_read_table() {
        let mut store = Store::open_in_memory(TableNames::default()).unwrap();
        store.write_table("Campaign_Data", &sample()).unwrap();
        assert_eq!(store.read_table("Campaign_Data").unwrap(), sample());
        assert_eq!(store.row_count("Campaign_Data").unwrap(), 2);
    }

    #[test]
    fn reading_a_missing_table() {
        let store = Store::open_in_memory(TableNames::default()).unwrap();
        assert_eq!(
            store.read_table("nope"),
            Err(StoreError::TableNotFound { table: "nope".into() })
        );
    }

    #[test]
    fn quoting_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn audit_log_tracks_latest_update() {
        let store = Store::open_in_memory(TableNames::default()).unwrap();
        assert_eq!(store.last_updated("HDFC_MIS_Data").unwrap(), None);
        store.log_update("HDFC_MIS_Data", 10, "tester", "New: 10, Updated: 0").unwrap();
        assert!(store.last_updated("HDFC_MIS_Data").unwrap().is_some());
        assert_eq!(store.last_updated("Other").unwrap(), None);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/cardops.db");
        Store::open(&path, TableNames::default()).unwrap();
        assert!(path.exists());
    }
}
