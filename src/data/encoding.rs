//! Typed encoding of raw tables into model-ready samples
//!
//! Columns whose every value parses as a number are kept as numeric
//! features. All other non-label columns are categorical and expand into
//! `k - 1` indicator features, dropping the lexicographically first category
//! as the reference level. Numeric features come first in file order,
//! followed by indicator features grouped per categorical column.

use crate::core::{Dataset, ExperimentError, PartitionKind, RecordId, Result, Sample};
use crate::data::csv::CsvTable;
use crate::data::partition::Partition;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Default label column of the heart failure prediction dataset
pub const DEFAULT_LABEL_COLUMN: &str = "HeartDisease";

/// Largest number of label classes a dataset may declare
pub const MAX_CLASSES: usize = 64;

/// Encoding of one categorical column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// Reference category, encoded as all-zero indicators
    pub dropped: String,
    /// Categories with their own indicator feature, sorted
    pub indicators: Vec<String>,
}

/// Fully numeric dataset with feature names and class labels
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    feature_names: Vec<String>,
    categorical: Vec<CategoricalColumn>,
    samples: Vec<Sample>,
    n_classes: usize,
}

impl EncodedDataset {
    /// Load and encode a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, label_column: &str) -> Result<Self> {
        let table = CsvTable::from_file(path)?;
        Self::from_table(&table, label_column)
    }

    /// Encode a parsed table
    pub fn from_table(table: &CsvTable, label_column: &str) -> Result<Self> {
        let label_idx = table.column_index(label_column)?;

        let mut labels = Vec::with_capacity(table.n_rows());
        for (row, raw) in table.column(label_idx).enumerate() {
            labels.push(parse_label(raw, row)?);
        }

        let mut numeric_cols = Vec::new();
        let mut categorical_cols = Vec::new();
        for (idx, name) in table.headers().iter().enumerate() {
            if idx == label_idx {
                continue;
            }
            if table.column(idx).all(|v| v.parse::<f64>().is_ok()) {
                numeric_cols.push(idx);
            } else {
                categorical_cols.push(idx);
                debug!("Column '{name}' treated as categorical");
            }
        }

        let mut feature_names: Vec<String> = numeric_cols
            .iter()
            .map(|&i| table.headers()[i].clone())
            .collect();

        let mut categorical = Vec::with_capacity(categorical_cols.len());
        for &idx in &categorical_cols {
            let name = table.headers()[idx].clone();
            let levels: BTreeSet<&str> = table.column(idx).collect();
            let mut levels = levels.into_iter().map(str::to_string);
            // Non-empty: the table has at least one row
            let dropped = levels.next().unwrap_or_default();
            let indicators: Vec<String> = levels.collect();

            feature_names.extend(indicators.iter().map(|level| format!("{name}_{level}")));
            categorical.push(CategoricalColumn {
                name,
                dropped,
                indicators,
            });
        }

        let mut samples = Vec::with_capacity(table.n_rows());
        for (row_idx, row) in table.rows().iter().enumerate() {
            let mut features = Vec::with_capacity(feature_names.len());
            for &idx in &numeric_cols {
                // Checked above when classifying the column
                let value = row[idx].parse::<f64>().map_err(|_| {
                    ExperimentError::ParseError(format!(
                        "Row {}: invalid number '{}'",
                        row_idx + 1,
                        row[idx]
                    ))
                })?;
                features.push(value);
            }
            for (col, &idx) in categorical.iter().zip(&categorical_cols) {
                let value = row[idx].as_str();
                features.extend(
                    col.indicators
                        .iter()
                        .map(|level| if level == value { 1.0 } else { 0.0 }),
                );
            }
            samples.push(Sample::new(RecordId(row_idx), features, labels[row_idx]));
        }

        let dataset = Self::from_samples(feature_names, samples)?;
        info!(
            "Encoded {} records into {} features ({} categorical column(s))",
            dataset.len(),
            dataset.dim(),
            categorical.len()
        );
        Ok(Self {
            categorical,
            ..dataset
        })
    }

    /// Build a dataset from already-numeric samples
    pub fn from_samples(feature_names: Vec<String>, samples: Vec<Sample>) -> Result<Self> {
        if samples.is_empty() {
            return Err(ExperimentError::EmptyDataset);
        }
        let dim = feature_names.len();
        for sample in &samples {
            if sample.dim() != dim {
                return Err(ExperimentError::DimensionMismatch {
                    expected: dim,
                    actual: sample.dim(),
                });
            }
        }

        let max_label = samples.iter().map(|s| s.label).max().unwrap_or(0);
        let n_classes = max_label
            .checked_add(1)
            .filter(|&n| n <= MAX_CLASSES)
            .ok_or_else(|| {
                ExperimentError::InvalidDataset(format!(
                    "label {max_label} exceeds the limit of {MAX_CLASSES} classes"
                ))
            })?;
        if n_classes < 2 {
            return Err(ExperimentError::InvalidDataset(
                "label column must contain at least two classes".to_string(),
            ));
        }

        let mut counts = vec![0usize; n_classes];
        for sample in &samples {
            counts[sample.label] += 1;
        }
        if let Some(empty) = counts.iter().position(|&c| c == 0) {
            return Err(ExperimentError::InvalidDataset(format!(
                "class {empty} has no records; labels must be consecutive integers from 0"
            )));
        }

        Ok(Self {
            feature_names,
            categorical: Vec::new(),
            samples,
            n_classes,
        })
    }

    /// Names of the encoded feature columns
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Categorical columns and their indicator layout
    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Samples in source order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Copy into an unsplit partition ready for [`crate::data::split`]
    pub fn to_partition(&self) -> Result<Partition> {
        Partition::new(
            PartitionKind::Full,
            self.samples.clone(),
            self.dim(),
            self.n_classes,
        )
    }
}

impl Dataset for EncodedDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.feature_names.len()
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn get_sample(&self, i: usize) -> &Sample {
        &self.samples[i]
    }
}

fn parse_label(raw: &str, row: usize) -> Result<usize> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| ExperimentError::ParseError(format!("Row {}: invalid label '{raw}'", row + 1)))?;
    if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
        return Err(ExperimentError::ParseError(format!(
            "Row {}: label must be a non-negative integer, got '{raw}'",
            row + 1
        )));
    }
    if value >= MAX_CLASSES as f64 {
        return Err(ExperimentError::ParseError(format!(
            "Row {}: label {raw} is outside 0..{MAX_CLASSES}",
            row + 1
        )));
    }
    Ok(value as usize)
}
