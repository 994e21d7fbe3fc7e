//! Campaign lead data.

use cardops_recon::columns::{SEQ_ID, STORE_SLUG};
use cardops_recon::model::Table;
use rusqlite::params;

use crate::error::StoreError;
use crate::{query_table, quote_ident, Store};

impl Store {
    /// Campaign rows whose `storeSlug` contains `store_filter` (ASCII case-insensitive).
    ///
    /// An empty filter returns every row.
    pub fn load_campaign(&self, store_filter: &str) -> Result<Table, StoreError> {
        let name = &self.tables().campaign;
        if !self.table_exists(name)? {
            return Err(StoreError::TableNotFound { table: name.clone() });
        }
        let table = if store_filter.is_empty() {
            self.read_table(name)?
        } else {
            let sql = format!(
                "SELECT * FROM {} WHERE {} LIKE ?1",
                quote_ident(name),
                quote_ident(STORE_SLUG)
            );
            query_table(self.connection(), &sql, params![format!("%{store_filter}%")])?
        };
        log::info!("store: {} campaign rows (store filter '{store_filter}')", table.len());
        Ok(table)
    }

    /// Replace the campaign table with an extract and record the load.
    ///
    /// Requires a `seqId` column. Returns the new row count.
    pub fn replace_campaign(&mut self, mut table: Table, actor: &str) -> Result<usize, StoreError> {
        table.trim_headers();
        if !table.has_column(SEQ_ID) {
            return Err(StoreError::MissingColumn { column: SEQ_ID.to_string() });
        }
        let name = self.tables().campaign.clone();
        self.write_table(&name, &table)?;
        let total = self.row_count(&name)?;
        if let Err(e) = self.log_update(&name, total, actor, &format!("Replaced: {total}")) {
            log::warn!("campaign load: could not write audit log: {e}");
        }
        Ok(total)
    }
}
