//! Raw trial tables and filtered views over them.
//!
//! A [`TrialTable`] is the content of one preprocessed CSV file, rows in
//! source order. Analyzers never modify it; filtering produces a
//! [`TrialSubset`] that borrows the table and records which rows belong to it.

use crate::error::{AnalysisError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Cell contents read as null.
const NULL_MARKERS: &[&str] = &[
    "", "NaN", "nan", "-NaN", "-nan", "NA", "N/A", "n/a", "<NA>", "#N/A", "NULL", "null", "None",
];

/// One subject's raw rows for one task.
#[derive(Debug, Clone)]
pub struct TrialTable {
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl TrialTable {
    /// Load a table from a CSV file with a header row.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a table from any CSV source with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(String::from).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self::new(headers, rows))
    }

    /// Build a table from already-split rows. Short rows are padded with nulls.
    pub fn new(headers: Vec<String>, mut rows: Vec<Vec<String>>) -> Self {
        let mut index = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            // First occurrence wins for duplicated headers.
            index.entry(name.clone()).or_insert(i);
        }
        for row in &mut rows {
            row.resize(headers.len(), String::new());
        }
        Self { index, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, or a `MissingColumn` error.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
    }

    /// Cell text, or `None` when the cell holds a null marker.
    fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let value = self.rows.get(row)?.get(column)?.as_str();
        if NULL_MARKERS.contains(&value) {
            None
        } else {
            Some(value)
        }
    }

    /// A view containing every row.
    pub fn all(&self) -> TrialSubset<'_> {
        TrialSubset {
            table: self,
            rows: (0..self.rows.len()).collect(),
        }
    }
}

/// An order-preserving selection of rows from a [`TrialTable`].
#[derive(Debug, Clone)]
pub struct TrialSubset<'a> {
    table: &'a TrialTable,
    rows: Vec<usize>,
}

impl<'a> TrialSubset<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose `column` holds exactly `value`.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<TrialSubset<'a>> {
        let col = self.table.column(column)?;
        Ok(self.retain(|row| self.table.cell(row, col) == Some(value)))
    }

    /// Rows whose `column` is numerically equal to `target`.
    pub fn filter_number_eq(&self, column: &str, target: f64) -> Result<TrialSubset<'a>> {
        let col = self.table.column(column)?;
        let mut rows = Vec::new();
        for &row in &self.rows {
            if self.number_at(row, col, column)? == Some(target) {
                rows.push(row);
            }
        }
        Ok(TrialSubset {
            table: self.table,
            rows,
        })
    }

    /// Rows whose `column` is null.
    pub fn filter_missing(&self, column: &str) -> Result<TrialSubset<'a>> {
        let col = self.table.column(column)?;
        Ok(self.retain(|row| self.table.cell(row, col).is_none()))
    }

    /// Numeric values of `column` for every row, `None` for null cells.
    pub fn numbers(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let col = self.table.column(column)?;
        self.rows
            .iter()
            .map(|&row| self.number_at(row, col, column))
            .collect()
    }

    /// Numeric value of `column` in the last row, or `None` if the subset is
    /// empty or that cell is null.
    pub fn last_number(&self, column: &str) -> Result<Option<f64>> {
        let col = self.table.column(column)?;
        match self.rows.last() {
            Some(&row) => self.number_at(row, col, column),
            None => Ok(None),
        }
    }

    /// Text of `column` at position `position` within this subset.
    pub fn text(&self, position: usize, column: &str) -> Result<Option<&'a str>> {
        let col = self.table.column(column)?;
        let table: &'a TrialTable = self.table;
        Ok(self
            .rows
            .get(position)
            .and_then(|&row| table.cell(row, col)))
    }

    fn retain(&self, mut keep: impl FnMut(usize) -> bool) -> TrialSubset<'a> {
        TrialSubset {
            table: self.table,
            rows: self.rows.iter().copied().filter(|&row| keep(row)).collect(),
        }
    }

    fn number_at(&self, row: usize, col: usize, column: &str) -> Result<Option<f64>> {
        let Some(raw) = self.table.cell(row, col) else {
            return Ok(None);
        };
        match raw.trim() {
            "True" | "true" => Ok(Some(1.0)),
            "False" | "false" => Ok(Some(0.0)),
            trimmed => trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| AnalysisError::InvalidValue {
                    column: column.to_string(),
                    row: row + 1,
                    value: raw.to_string(),
                }),
        }
    }
}
