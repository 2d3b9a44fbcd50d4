//! Delimited tabular file reader
//!
//! Reads comma-separated files where:
//! - The first non-comment line is a header naming every column
//! - Every following row has exactly as many fields as the header
//! - Empty lines and lines starting with `#` are skipped
//!
//! Values are kept as trimmed strings; typing and encoding happen in
//! [`crate::data::encoding`].

use crate::core::{ExperimentError, Result};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Raw table of string cells with named columns
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Load a table from a CSV file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading CSV table from {path:?}");
        let file = File::open(path).map_err(ExperimentError::IoError)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a table from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(ExperimentError::IoError)?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields = Self::split_line(line);
            match &headers {
                None => {
                    if fields.iter().any(|f| f.is_empty()) {
                        return Err(ExperimentError::ParseError(format!(
                            "Header on line {} has an empty column name",
                            line_no + 1
                        )));
                    }
                    headers = Some(fields);
                }
                Some(h) => {
                    if fields.len() != h.len() {
                        return Err(ExperimentError::ParseError(format!(
                            "Line {} has {} fields, header has {}",
                            line_no + 1,
                            fields.len(),
                            h.len()
                        )));
                    }
                    rows.push(fields);
                }
            }
        }

        let headers = headers.ok_or(ExperimentError::EmptyDataset)?;
        if rows.is_empty() {
            return Err(ExperimentError::EmptyDataset);
        }

        Ok(Self { headers, rows })
    }

    fn split_line(line: &str) -> Vec<String> {
        line.split(',').map(|f| f.trim().to_string()).collect()
    }

    /// Column names in file order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows in file order
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ExperimentError::MissingColumn(name.to_string()))
    }

    /// All cells of one column, in row order
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }
}
