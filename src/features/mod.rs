//! Feature extraction
//!
//! Converts loosely-typed behavioural records (key -> value maps where any
//! recognised key may be absent) into fixed-order numeric feature vectors.
//!
//! - [`Record`] - raw input record
//! - [`FeatureSchema`] - ordered, versioned list of recognised features
//! - [`RecordExtractor`] - schema-driven record -> [`FeatureVector`] mapping

mod learning_style;
mod performance;

pub use learning_style::LEARNING_STYLE_SCHEMA;
pub use performance::{PERFORMANCE_SCHEMA, UNKNOWN_STYLE_INDEX};

use crate::error::{EdumindError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw input record: named signals, any of which may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<serde_json::Map<String, Value>> for Record {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// How a single feature position is read from a record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureKind {
    /// Numeric value constrained to `[min, max]`, default 0
    Numeric { min: f64, max: f64 },
    /// Category name encoded by position; anything unrecognised (or absent)
    /// encodes as `categories.len()`
    Categorical { categories: &'static [&'static str] },
}

/// One named feature position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    /// Numeric feature that must not be negative
    pub const fn non_negative(name: &'static str) -> Self {
        Self {
            name,
            kind: FeatureKind::Numeric { min: 0.0, max: f64::INFINITY },
        }
    }

    /// Numeric feature bounded on both sides
    pub const fn bounded(name: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: FeatureKind::Numeric { min, max },
        }
    }

    /// Categorical feature with a fixed encoding
    pub const fn categorical(name: &'static str, categories: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: FeatureKind::Categorical { categories },
        }
    }

    /// Value used when the record does not carry this feature
    pub fn default_value(&self) -> f64 {
        match self.kind {
            FeatureKind::Numeric { .. } => 0.0,
            FeatureKind::Categorical { categories } => categories.len() as f64,
        }
    }

    fn extract(&self, value: Option<&Value>) -> Result<f64> {
        let value = match value {
            None | Some(Value::Null) => return Ok(self.default_value()),
            Some(v) => v,
        };

        match self.kind {
            FeatureKind::Numeric { min, max } => {
                let x = coerce_number(value).ok_or_else(|| self.invalid("is not numeric"))?;
                if !x.is_finite() {
                    return Err(self.invalid("is not finite"));
                }
                if x < min {
                    return Err(self.invalid(&format!("must be >= {}, got {}", min, x)));
                }
                if x > max {
                    return Err(self.invalid(&format!("must be <= {}, got {}", max, x)));
                }
                Ok(x)
            }
            FeatureKind::Categorical { categories } => {
                let name = value
                    .as_str()
                    .ok_or_else(|| self.invalid("must be a category name"))?;
                let normalized = normalize_category(name);
                let index = categories
                    .iter()
                    .position(|c| *c == normalized)
                    .unwrap_or(categories.len());
                Ok(index as f64)
            }
        }
    }

    fn invalid(&self, reason: &str) -> EdumindError {
        EdumindError::InvalidRecord {
            field: self.name.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn normalize_category(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' || c == '/' { '_' } else { c })
        .collect()
}

/// Ordered, versioned feature layout. Changing it requires retraining.
#[derive(Debug)]
pub struct FeatureSchema {
    pub name: &'static str,
    pub version: u32,
    pub features: &'static [FeatureSpec],
}

impl FeatureSchema {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature names in vector order
    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.to_string()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }
}

/// Fixed-order numeric encoding of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from_vec(self.values.clone())
    }
}

/// Schema-driven extractor shared by both pipelines
#[derive(Debug, Clone, Copy)]
pub struct RecordExtractor {
    schema: &'static FeatureSchema,
}

impl RecordExtractor {
    pub const fn new(schema: &'static FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'static FeatureSchema {
        self.schema
    }

    /// Extract one record. Missing keys take their documented default;
    /// present values that are non-numeric or out of domain fail.
    pub fn extract(&self, record: &Record) -> Result<FeatureVector> {
        let values = self
            .schema
            .features
            .iter()
            .map(|spec| spec.extract(record.get(spec.name)))
            .collect::<Result<Vec<f64>>>()?;
        Ok(FeatureVector::new(values))
    }

    /// Extract a batch into an `n_records x n_features` matrix
    pub fn extract_batch(&self, records: &[Record]) -> Result<Array2<f64>> {
        let n_features = self.schema.len();
        let mut flat = Vec::with_capacity(records.len() * n_features);
        for record in records {
            flat.extend_from_slice(self.extract(record)?.as_slice());
        }
        Ok(Array2::from_shape_vec((records.len(), n_features), flat)?)
    }
}
