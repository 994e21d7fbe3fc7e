use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{non_empty, Table};

pub const TOTAL_COLUMN: &str = "Total";
pub const GRAND_TOTAL_ROW: &str = "Grand Total";

/// Count pivot: one row per index value, one column per category value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pivot {
    pub index_name: String,
    pub categories: Vec<String>,
    pub rows: Vec<PivotRow>,
    pub grand_total: PivotRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotRow {
    pub label: String,
    pub counts: Vec<usize>,
    pub total: usize,
}

impl Pivot {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flatten into a table: index column, categories, `Total`, then a `Grand Total` row.
    pub fn to_table(&self) -> Table {
        let mut columns = Vec::with_capacity(self.categories.len() + 2);
        columns.push(self.index_name.clone());
        columns.extend(self.categories.iter().cloned());
        columns.push(TOTAL_COLUMN.to_string());

        let mut table = Table::new(columns);
        for row in self.rows.iter().chain(std::iter::once(&self.grand_total)) {
            let mut cells = Vec::with_capacity(row.counts.len() + 2);
            cells.push(Some(row.label.clone()));
            cells.extend(row.counts.iter().map(|c| Some(c.to_string())));
            cells.push(Some(row.total.to_string()));
            table.push_row(cells);
        }
        table
    }
}

/// Count non-null `value_col` entries per (`index_col`, `category_col`) pair.
///
/// Rows with a blank index or category are skipped. Index and category labels
/// are sorted ascending; missing combinations count as zero.
pub fn pivot_count(table: &Table, index_col: usize, category_col: usize, value_col: usize) -> Pivot {
    let mut cells: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut index_labels = BTreeSet::new();
    let mut categories = BTreeSet::new();

    for row in 0..table.len() {
        let (Some(index), Some(category)) = (
            non_empty(table.get(row, index_col)),
            non_empty(table.get(row, category_col)),
        ) else {
            continue;
        };
        index_labels.insert(index.to_string());
        categories.insert(category.to_string());
        if table.get(row, value_col).is_some() {
            *cells.entry((index.to_string(), category.to_string())).or_insert(0) += 1;
        }
    }

    let categories: Vec<String> = categories.into_iter().collect();
    let mut grand_counts = vec![0usize; categories.len()];

    let rows: Vec<PivotRow> = index_labels
        .into_iter()
        .map(|label| {
            let counts: Vec<usize> = categories
                .iter()
                .map(|c| cells.get(&(label.clone(), c.clone())).copied().unwrap_or(0))
                .collect();
            for (g, c) in grand_counts.iter_mut().zip(&counts) {
                *g += c;
            }
            let total = counts.iter().sum();
            PivotRow { label, counts, total }
        })
        .collect();

    let grand_total = PivotRow {
        label: GRAND_TOTAL_ROW.to_string(),
        total: grand_counts.iter().sum(),
        counts: grand_counts,
    };

    Pivot {
        index_name: table.columns[index_col].clone(),
        categories,
        rows,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(rows: &[(&str, &str, Option<&str>)]) -> Table {
        Table::from_rows(
            vec!["date".into(), "decision".into(), "app".into()],
            rows.iter()
                .map(|(d, s, a)| vec![Some(d.to_string()), Some(s.to_string()), a.map(String::from)])
                .collect(),
        )
    }

    #[test]
    fn counts_totals_and_grand_total() {
        let table = t(&[
            ("2024-01-02", "DECLINE", Some("a1")),
            ("2024-01-01", "APPROVE", Some("a2")),
            ("2024-01-01", "APPROVE", Some("a3")),
            ("2024-01-01", "DECLINE", Some("a4")),
        ]);
        let p = pivot_count(&table, 0, 1, 2);
        assert_eq!(p.categories, vec!["APPROVE", "DECLINE"]);
        assert_eq!(p.rows.len(), 2);
        assert_eq!(p.rows[0].label, "2024-01-01");
        assert_eq!(p.rows[0].counts, vec![2, 1]);
        assert_eq!(p.rows[0].total, 3);
        assert_eq!(p.rows[1].counts, vec![0, 1]);
        assert_eq!(p.grand_total.counts, vec![2, 2]);
        assert_eq!(p.grand_total.total, 4);
    }

    #[test]
    fn null_values_do_not_count() {
        let table = t(&[("2024-01-01", "APPROVE", None), ("2024-01-01", "APPROVE", Some("x"))]);
        let p = pivot_count(&table, 0, 1, 2);
        assert_eq!(p.rows[0].counts, vec![1]);
    }

    #[test]
    fn blank_keys_are_skipped() {
        let table = t(&[("", "APPROVE", Some("x")), ("2024-01-01", " ", Some("y"))]);
        let p = pivot_count(&table, 0, 1, 2);
        assert!(p.is_empty());
        assert_eq!(p.grand_total.total, 0);
    }

    #[test]
    fn flattened_table_layout() {
        let table = t(&[("2024-01-01", "APPROVE", Some("x"))]);
        let flat = pivot_count(&table, 0, 1, 2).to_table();
        assert_eq!(flat.columns, vec!["date", "APPROVE", "Total"]);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat.get(1, 0), Some("Grand Total"));
        assert_eq!(flat.get(1, 2), Some("1"));
    }
}
