//! Loading training and prediction records from disk
//!
//! Supports JSON arrays of objects, JSON lines and CSV (read through
//! polars). Values are handed to the feature extractor untouched apart from
//! type mapping, so validation happens in one place.

use crate::error::{EdumindError, Result};
use crate::features::Record;
use polars::prelude::*;
use serde_json::Value;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Records plus their labels when a label column was requested
#[derive(Debug, Clone, Default)]
pub struct LabeledRecords {
    pub records: Vec<Record>,
    pub labels: Option<Vec<String>>,
}

impl LabeledRecords {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    JsonArray,
    JsonLines,
    Csv,
}

impl RecordFormat {
    /// Detect from the extension; `.json` files are sniffed for a leading `[`
    pub fn detect(path: &Path, contents: Option<&str>) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => RecordFormat::Csv,
            "jsonl" | "ndjson" => RecordFormat::JsonLines,
            _ => match contents.map(str::trim_start) {
                Some(text) if text.starts_with('[') => RecordFormat::JsonArray,
                _ => RecordFormat::JsonLines,
            },
        }
    }
}

/// Record loader for JSON, JSON lines and CSV files
#[derive(Debug, Clone, Default)]
pub struct RecordLoader {
    /// Field holding the training label, removed from each record
    label_column: Option<String>,
}

impl RecordLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split out a label field
    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = Some(column.into());
        self
    }

    /// Detect the format and load
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LabeledRecords> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EdumindError::DataError(format!(
                "Input file not found: {}",
                path.display()
            )));
        }

        let loaded = match RecordFormat::detect(path, None) {
            RecordFormat::Csv => self.load_csv(path)?,
            _ => {
                let text = fs::read_to_string(path)?;
                self.parse_json(&text)?
            }
        };

        info!(
            path = %path.display(),
            records = loaded.len(),
            labelled = loaded.labels.is_some(),
            "Loaded records"
        );
        Ok(loaded)
    }

    /// Parse a JSON array of objects or JSON lines
    pub fn parse_json(&self, text: &str) -> Result<LabeledRecords> {
        let objects: Vec<Value> = match RecordFormat::detect(Path::new(""), Some(text)) {
            RecordFormat::JsonArray => serde_json::from_str(text)?,
            _ => text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<std::result::Result<Vec<Value>, _>>()?,
        };

        let mut records = Vec::with_capacity(objects.len());
        let mut labels = Vec::with_capacity(objects.len());
        for (row, value) in objects.into_iter().enumerate() {
            let Value::Object(mut map) = value else {
                return Err(EdumindError::DataError(format!(
                    "Row {} is not a JSON object",
                    row
                )));
            };
            if let Some(column) = &self.label_column {
                let label = map.remove(column).ok_or_else(|| {
                    EdumindError::DataError(format!("Row {} has no `{}` field", row, column))
                })?;
                labels.push(label_text(&label, row)?);
            }
            records.push(Record::from(map));
        }

        Ok(LabeledRecords {
            records,
            labels: self.label_column.as_ref().map(|_| labels),
        })
    }

    /// Load a CSV file through polars
    pub fn load_csv(&self, path: &Path) -> Result<LabeledRecords> {
        let file = File::open(path).map_err(|e| EdumindError::DataError(e.to_string()))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()?;

        let n_rows = df.height();
        let mut records = vec![Record::new(); n_rows];
        let mut labels: Option<Vec<String>> = None;

        for column in df.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();

            if self.label_column.as_deref() == Some(name.as_str()) {
                labels = Some(csv_labels(series)?);
                continue;
            }

            for (record, value) in records.iter_mut().zip(csv_values(series)?) {
                if !value.is_null() {
                    record.insert(name.clone(), value);
                }
            }
        }

        if let Some(column) = &self.label_column {
            if labels.is_none() {
                return Err(EdumindError::DataError(format!(
                    "CSV has no `{}` column",
                    column
                )));
            }
        }

        Ok(LabeledRecords { records, labels })
    }
}

/// Column values as JSON scalars, keeping strings as strings
fn csv_values(series: &Series) -> Result<Vec<Value>> {
    let values: Vec<Value> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
            .collect(),
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        _ => {
            let floats = series.cast(&DataType::Float64)?;
            let values: Vec<Value> = floats
                .f64()?
                .into_iter()
                .map(|v| {
                    v.and_then(serde_json::Number::from_f64)
                        .map_or(Value::Null, Value::Number)
                })
                .collect();
            values
        }
    };
    Ok(values)
}

fn csv_labels(series: &Series) -> Result<Vec<String>> {
    csv_values(series)?
        .iter()
        .enumerate()
        .map(|(row, v)| label_text(v, row))
        .collect()
}

/// Labels as text; integral numbers render without a fraction
fn label_text(value: &Value, row: usize) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(u), _) => Ok(u.to_string()),
            (None, Some(f)) => Ok(format!("{}", f)),
            _ => Ok(n.to_string()),
        },
        other => Err(EdumindError::DataError(format!(
            "Row {} has unusable label {}",
            row, other
        ))),
    }
}
