//! Read-only SQL console.

use cardops_recon::model::Table;
use rusqlite::Connection;

use crate::error::StoreError;
use crate::{query_table, table_columns, Store};

/// Keywords that modify data or schema. Matched as raw substrings of the
/// upper-cased query, so identifiers such as `created_at` are refused too.
pub const DENIED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "UPDATE", "INSERT", "ALTER", "CREATE", "GRANT", "REVOKE",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// `Err(UnsafeQuery)` naming the first denied keyword found.
pub fn is_safe_query(sql: &str) -> Result<(), StoreError> {
    let upper = sql.trim().to_uppercase();
    match DENIED_KEYWORDS.iter().find(|k| upper.contains(*k)) {
        Some(keyword) => Err(StoreError::UnsafeQuery { keyword: keyword.to_string() }),
        None => Ok(()),
    }
}

/// SQLite's own verdict on the statement, plus ATTACH/DETACH which it
/// counts as read-only although they can create database files.
fn ensure_read_only(conn: &Connection, sql: &str) -> Result<(), StoreError> {
    let attaches = sql
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case("ATTACH") || word.eq_ignore_ascii_case("DETACH"));
    if attaches || !conn.prepare(sql)?.readonly() {
        return Err(StoreError::WriteStatement);
    }
    Ok(())
}

impl Store {
    /// Run a read-only query. Every value comes back as text; NULL as null.
    pub fn execute_query(&self, sql: &str) -> Result<Table, StoreError> {
        is_safe_query(sql)?;
        ensure_read_only(self.connection(), sql)?;
        let table = query_table(self.connection(), sql, [])?;
        log::debug!("console: query returned {} rows", table.len());
        Ok(table)
    }

    /// User tables, sorted by name.
    pub fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.connection().prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let cols = table_columns(self.connection(), table)?;
        if cols.is_empty() {
            return Err(StoreError::TableNotFound { table: table.to_string() });
        }
        Ok(cols
            .into_iter()
            .map(|(name, data_type)| ColumnInfo { name, data_type })
            .collect())
    }
}
