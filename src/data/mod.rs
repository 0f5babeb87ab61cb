//! Tabular input handling
//!
//! Uploaded spreadsheets and CSV files are read into a [`RawTable`]: column
//! names plus loosely-typed text cells. Nothing here interprets the cells;
//! that is the encoder's job.

mod loader;

pub use loader::{detect_format, write_predictions_csv, FileFormat, TableLoader};

use crate::error::{Result, ScreeningError};
use serde::{Deserialize, Serialize};

/// A record set with text cells, as read from an upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Build a table, checking every row has one cell per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(ScreeningError::MalformedUpload(format!(
                "row {} has {} cells but the header has {} columns",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from string literals; blank cells become `None`
    pub fn from_strs(columns: &[&str], rows: &[&[&str]]) -> Result<Self> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|v| if v.trim().is_empty() { None } else { Some(v.to_string()) })
                        .collect()
                })
                .collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one row, in column order
    pub fn row_cells(&self, index: usize) -> Option<&[Option<String>]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    pub fn row(&self, index: usize) -> RawRow<'_> {
        RawRow { table: self, index }
    }

    pub fn rows(&self) -> impl Iterator<Item = RawRow<'_>> {
        (0..self.rows.len()).map(move |index| RawRow { table: self, index })
    }

    /// All values of a column, or `None` when the column is absent
    pub fn column_values(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    /// Return a copy with an extra column appended
    pub fn with_column(&self, name: impl Into<String>, values: Vec<String>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(ScreeningError::ShapeError {
                expected: format!("{} values", self.rows.len()),
                actual: format!("{} values", values.len()),
            });
        }
        let mut columns = self.columns.clone();
        columns.push(name.into());
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(r, v)| {
                let mut r = r.clone();
                r.push(Some(v));
                r
            })
            .collect();
        Ok(Self { columns, rows })
    }
}

/// Borrowed view of one table row
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    table: &'a RawTable,
    index: usize,
}

impl<'a> RawRow<'a> {
    /// Zero-based row number within the table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw cell text for `column`; `None` when the column is absent or the cell is empty
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.table.column_index(column)?;
        self.table.rows[self.index][idx].as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_access() {
        let table = RawTable::from_strs(
            &["JK", "Umur", "Demam"],
            &[&["L", "40", "Ya"], &["P", "", "Tidak"]],
        )
        .unwrap();

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.row(0).get("Demam"), Some("Ya"));
        assert_eq!(table.row(1).get("Umur"), None);
        assert_eq!(table.row(1).get("Missing"), None);
        assert_eq!(
            table.column_values("JK").unwrap(),
            vec![Some("L"), Some("P")]
        );
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![Some("1".into())]],
        )
        .unwrap_err();
        assert!(matches!(err, ScreeningError::MalformedUpload(_)));
    }

    #[test]
    fn test_with_column() {
        let table = RawTable::from_strs(&["a"], &[&["1"], &["2"]]).unwrap();
        let out = table.with_column("pred", vec!["x".into(), "y".into()]).unwrap();
        assert_eq!(out.columns(), &["a".to_string(), "pred".to_string()]);
        assert_eq!(out.row(1).get("pred"), Some("y"));
        assert!(table.with_column("pred", vec![]).is_err());
    }
}
