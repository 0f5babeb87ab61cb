//! Reading uploads into [`RawTable`]s and writing prediction tables back out

use crate::error::{Result, ScreeningError};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use super::RawTable;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Parquet,
    Excel,
    Unknown,
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "csv"),
            FileFormat::Json => write!(f, "json"),
            FileFormat::Parquet => write!(f, "parquet"),
            FileFormat::Excel => write!(f, "excel"),
            FileFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detect format from the file name, falling back to the leading bytes
pub fn detect_format(file_name: &str, bytes: &[u8]) -> FileFormat {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".csv") || lower.ends_with(".txt") {
        FileFormat::Csv
    } else if lower.ends_with(".json") || lower.ends_with(".jsonl") || lower.ends_with(".ndjson") {
        FileFormat::Json
    } else if lower.ends_with(".parquet") || lower.ends_with(".pq") {
        FileFormat::Parquet
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") || lower.ends_with(".ods") {
        FileFormat::Excel
    } else if bytes.starts_with(b"PAR1") {
        FileFormat::Parquet
    } else if bytes.starts_with(&[0x50, 0x4B]) || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        // xlsx is a ZIP container, legacy xls an OLE2 compound file
        FileFormat::Excel
    } else if bytes.first().is_some_and(|b| *b == b'[' || *b == b'{') {
        FileFormat::Json
    } else if bytes.is_empty() {
        FileFormat::Unknown
    } else {
        FileFormat::Csv
    }
}

/// Loader for patient tables
#[derive(Debug, Clone)]
pub struct TableLoader {
    /// Rows scanned for CSV schema inference
    infer_schema_length: usize,
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set number of rows used for CSV type inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a table from disk
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<RawTable> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.load_bytes(&name, &bytes)
    }

    /// Load a table from an in-memory upload
    pub fn load_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<RawTable> {
        let start = Instant::now();
        let format = detect_format(file_name, bytes);
        debug!(file = %file_name, format = %format, bytes = bytes.len(), "Parsing upload");

        let table = match format {
            FileFormat::Csv => {
                let df = CsvReadOptions::default()
                    .with_infer_schema_length(Some(self.infer_schema_length))
                    .with_has_header(true)
                    .into_reader_with_file_handle(Cursor::new(bytes))
                    .finish()?;
                dataframe_to_table(&df)?
            }
            FileFormat::Json => {
                let df = JsonReader::new(Cursor::new(bytes)).finish()?;
                dataframe_to_table(&df)?
            }
            FileFormat::Parquet => {
                let df = ParquetReader::new(Cursor::new(bytes)).finish()?;
                dataframe_to_table(&df)?
            }
            FileFormat::Excel => read_workbook(bytes)?,
            FileFormat::Unknown => {
                return Err(ScreeningError::MalformedUpload(format!(
                    "cannot determine the format of '{}'; use xlsx, csv, json or parquet",
                    file_name
                )))
            }
        };

        if table.columns().is_empty() {
            return Err(ScreeningError::MalformedUpload(format!(
                "'{}' has no header row",
                file_name
            )));
        }

        info!(
            file = %file_name,
            format = %format,
            rows = table.n_rows(),
            columns = table.columns().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded table"
        );
        Ok(table)
    }
}

/// Convert every column to text; typed numbers become their display form
fn dataframe_to_table(df: &DataFrame) -> Result<RawTable> {
    let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

    let mut by_column: Vec<Vec<Option<String>>> = Vec::with_capacity(columns.len());
    for column in df.get_columns() {
        let series = column.as_materialized_series().cast(&DataType::String)?;
        let ca = series.str()?;
        by_column.push(
            ca.into_iter()
                .map(|v| v.filter(|s| !s.trim().is_empty()).map(|s| s.to_string()))
                .collect(),
        );
    }

    let rows = (0..df.height())
        .map(|i| by_column.iter().map(|col| col[i].clone()).collect())
        .collect();
    RawTable::new(columns, rows)
}

/// Read the first sheet of a workbook; the first row is the header
fn read_workbook(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ScreeningError::MalformedUpload("workbook has no sheets".to_string()))??;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| ScreeningError::MalformedUpload("first sheet is empty".to_string()))?;

    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell_text(cell) {
            Some(name) => name,
            None => format!("column_{}", i + 1),
        })
        .collect();

    let body: Vec<Vec<Option<String>>> = rows
        .filter(|r| r.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|r| r.iter().map(cell_text).collect())
        .collect();

    RawTable::new(columns, body)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        other => {
            let text = other.to_string();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

/// Write a table (typically inputs plus a prediction column) as CSV
pub fn write_predictions_csv(table: &RawTable, path: impl AsRef<Path>) -> Result<()> {
    let columns: Vec<Column> = table
        .columns()
        .iter()
        .map(|name| {
            let values: Vec<Option<String>> = table
                .column_values(name)
                .unwrap_or_default()
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect();
            Series::new(name.as_str().into(), values).into()
        })
        .collect();

    let mut df = DataFrame::new(columns)?;
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    info!(path = %path.as_ref().display(), rows = df.height(), "Wrote predictions");
    Ok(())
}
