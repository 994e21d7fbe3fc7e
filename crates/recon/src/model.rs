use serde::Serialize;

/// A single value. `None` is a null (missing) value, distinct from an empty string.
pub type Cell = Option<String>;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A flat, column-named dataset. Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Build a table, padding short rows with nulls and truncating long ones.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Exact (case-sensitive) column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(move |r| r.get(col).and_then(|c| c.as_deref()))
    }

    /// Strip surrounding whitespace from every header.
    pub fn trim_headers(&mut self) {
        for c in &mut self.columns {
            let trimmed = c.trim();
            if trimmed.len() != c.len() {
                *c = trimmed.to_string();
            }
        }
    }

    pub fn rename_column(&mut self, col: usize, name: &str) {
        if let Some(c) = self.columns.get_mut(col) {
            *c = name.to_string();
        }
    }

    /// Append a column. `values` is padded with nulls if shorter than the table.
    pub fn add_column(&mut self, name: &str, mut values: Vec<Cell>) {
        values.resize(self.rows.len(), None);
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Replace every value of a column in place.
    pub fn map_column(&mut self, col: usize, mut f: impl FnMut(Option<&str>) -> Cell) {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(col) {
                *cell = f(cell.as_deref());
            }
        }
    }

    /// Project (and reorder) columns by index.
    pub fn select(&self, indices: &[usize]) -> Table {
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Table { columns, rows }
    }

    /// Keep the rows for which `keep(row_index)` is true.
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Table {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, r)| r.clone())
            .collect();
        Table { columns: self.columns.clone(), rows }
    }
}

/// Trim a value and treat empty results as missing.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        Some(s.to_string())
    }

    #[test]
    fn ragged_rows_are_normalized() {
        let t = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![cell("1")], vec![cell("1"), cell("2"), cell("3")]],
        );
        assert_eq!(t.rows[0], vec![cell("1"), None]);
        assert_eq!(t.rows[1], vec![cell("1"), cell("2")]);
    }

    #[test]
    fn add_column_pads_missing_values() {
        let mut t = Table::from_rows(vec!["a".into()], vec![vec![cell("x")], vec![cell("y")]]);
        t.add_column("b", vec![cell("1")]);
        assert_eq!(t.columns, vec!["a", "b"]);
        assert_eq!(t.get(0, 1), Some("1"));
        assert_eq!(t.get(1, 1), None);
    }

    #[test]
    fn select_reorders() {
        let t = Table::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![cell("1"), cell("2"), cell("3")]],
        );
        let s = t.select(&[2, 0]);
        assert_eq!(s.columns, vec!["c", "a"]);
        assert_eq!(s.rows[0], vec![cell("3"), cell("1")]);
    }

    #[test]
    fn trim_headers_strips_whitespace() {
        let mut t = Table::new(vec![" LC2_CODE ".into(), "seqId".into()]);
        t.trim_headers();
        assert_eq!(t.columns, vec!["LC2_CODE", "seqId"]);
    }
}
