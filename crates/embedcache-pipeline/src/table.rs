//! In-memory CSV table.
//!
//! Every value is kept as a string. Short rows are padded with empty values
//! and the usual missing-value markers (`NA`, `null`, `NaN`, ...) read as
//! empty, so a missing field reads the same as an empty one. Rows longer than
//! the header are rejected.

use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::error::PipelineError;

/// Cell values read as missing. Matched exactly, without trimming.
pub const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing_marker(value: &str) -> bool {
    MISSING_MARKERS.contains(&value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Read a CSV file with a header row.
    pub fn read_csv(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::InputMissing(path.to_path_buf()));
        }
        let table = Self::from_reader(fs::File::open(path)?)?;
        info!(path = ?path, rows = table.len(), columns = table.headers.len(), "Loaded input table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if record.len() > headers.len() {
                return Err(PipelineError::RowTooLong {
                    line: record.position().map_or(0, |p| p.line()),
                    expected: headers.len(),
                    actual: record.len(),
                });
            }
            rows.push(
                record
                    .iter()
                    .map(|value| {
                        if is_missing_marker(value) {
                            String::new()
                        } else {
                            value.to_string()
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self::new(headers, rows))
    }

    /// Position of `name` in the header.
    pub fn column_index(&self, name: &str) -> Result<usize, PipelineError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &str> + '_, PipelineError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
