//! Sample metadata handling.

use crate::error::{DaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Column names probed, in order, when no sample-id column is given.
pub const SAMPLE_ID_CANDIDATES: [&str; 6] = [
    "SampleName",
    "Sample",
    "SampleID",
    "Sample_ID",
    "sample_name",
    "sample_id",
];

/// A variable value that can be categorical or continuous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Label of this value as a group, whatever its stored type.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Variable::Categorical(s) => Some(s.clone()),
            Variable::Continuous(v) => Some(v.to_string()),
            Variable::Missing => None,
        }
    }
}

/// Type hint for metadata columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

/// How the sample-id column was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleIdSource {
    /// Named explicitly by the caller.
    Explicit,
    /// Matched one of [`SAMPLE_ID_CANDIDATES`].
    Detected,
    /// Nothing matched; the first column was used.
    FirstColumn,
}

/// Sample metadata: one row per sample, keyed by sample identifier.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Sample IDs in file order.
    sample_ids: Vec<String>,
    /// Variable column names (the sample-id column excluded).
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type of each column.
    column_types: HashMap<String, VariableType>,
    /// Cell text of values parsed as numbers, sample_id -> column_name -> text.
    numeric_text: HashMap<String, HashMap<String, String>>,
    /// Name of the sample-id column in the source file.
    sample_id_column: String,
    id_source: SampleIdSource,
}

impl Metadata {
    /// Load metadata from a comma-separated file.
    ///
    /// Columns are inferred as continuous if every non-missing value parses as a
    /// number, otherwise categorical. `sample_id_col` overrides auto-detection.
    pub fn from_csv<P: AsRef<Path>>(path: P, sample_id_col: Option<&str>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let header: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }
        Self::from_records(header, rows, sample_id_col)
    }

    /// Build metadata from a header and raw string rows.
    pub fn from_records(
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        sample_id_col: Option<&str>,
    ) -> Result<Self> {
        if header.len() < 2 {
            return Err(DaError::EmptyData(
                "Metadata must have a sample-id column and at least one variable".to_string(),
            ));
        }
        if rows.is_empty() {
            return Err(DaError::EmptyData("No samples in metadata".to_string()));
        }

        let (id_idx, id_source) = match sample_id_col {
            Some(name) => {
                let idx = header
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| DaError::MissingColumn(name.to_string()))?;
                (idx, SampleIdSource::Explicit)
            }
            None => SAMPLE_ID_CANDIDATES
                .iter()
                .find_map(|cand| header.iter().position(|h| h == cand))
                .map(|idx| (idx, SampleIdSource::Detected))
                .unwrap_or((0, SampleIdSource::FirstColumn)),
        };

        let column_names: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_idx)
            .map(|(_, h)| h.clone())
            .collect();

        // Infer column types
        let mut column_types = HashMap::new();
        for col_name in &column_names {
            let col_idx = header.iter().position(|h| h == col_name).unwrap_or(0);
            let all_numeric = rows
                .iter()
                .all(|row| cell(row, col_idx).map_or(true, |v| v.parse::<f64>().is_ok()));
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::with_capacity(rows.len());
        let mut data = HashMap::with_capacity(rows.len());
        let mut numeric_text = HashMap::new();
        for row in &rows {
            let sample_id = cell(row, id_idx)
                .ok_or_else(|| DaError::EmptyData("Metadata row without sample id".to_string()))?;
            if data.contains_key(&sample_id) {
                return Err(DaError::DuplicateId(sample_id));
            }

            let mut sample_data = HashMap::new();
            let mut sample_text = HashMap::new();
            for (col_idx, col_name) in header.iter().enumerate() {
                if col_idx == id_idx {
                    continue;
                }
                let var = match cell(row, col_idx) {
                    None => Variable::Missing,
                    Some(raw) => match column_types.get(col_name) {
                        Some(VariableType::Continuous) => match raw.parse::<f64>() {
                            Ok(v) => {
                                sample_text.insert(col_name.clone(), raw);
                                Variable::Continuous(v)
                            }
                            Err(_) => Variable::Missing,
                        },
                        Some(VariableType::Categorical) | None => Variable::Categorical(raw),
                    },
                };
                sample_data.insert(col_name.clone(), var);
            }
            sample_ids.push(sample_id.clone());
            numeric_text.insert(sample_id.clone(), sample_text);
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
            numeric_text,
            sample_id_column: header[id_idx].clone(),
            id_source,
        })
    }

    /// Force a column to be treated as categorical (e.g. numeric group codes).
    ///
    /// Levels keep the cell text as written, so `01` stays `01`.
    pub fn with_categorical(mut self, column: &str) -> Result<Self> {
        if !self.has_column(column) {
            return Err(DaError::MissingColumn(column.to_string()));
        }
        self.column_types
            .insert(column.to_string(), VariableType::Categorical);
        for (sid, sample_data) in self.data.iter_mut() {
            if let Some(var) = sample_data.get_mut(column) {
                if let Variable::Continuous(v) = *var {
                    let text = self
                        .numeric_text
                        .get(sid)
                        .and_then(|m| m.get(column))
                        .cloned()
                        .unwrap_or_else(|| v.to_string());
                    *var = Variable::Categorical(text);
                }
            }
        }
        Ok(self)
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Variable column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Name of the sample-id column.
    pub fn sample_id_column(&self) -> &str {
        &self.sample_id_column
    }

    /// How the sample-id column was chosen.
    pub fn id_source(&self) -> SampleIdSource {
        self.id_source
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Get all values for a column.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(DaError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Sorted unique labels of a column, missing values excluded.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let values = self.column(column)?;
        let levels: BTreeSet<String> = values.iter().filter_map(|v| v.as_label()).collect();
        Ok(levels.into_iter().collect())
    }

    /// Subset metadata to the specified samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::with_capacity(sample_ids.len());
        let mut new_text = HashMap::with_capacity(sample_ids.len());
        for sid in sample_ids {
            let sample_data = self.data.get(sid).ok_or_else(|| {
                DaError::InvalidParameter(format!("Sample '{}' not found in metadata", sid))
            })?;
            new_data.insert(sid.clone(), sample_data.clone());
            if let Some(text) = self.numeric_text.get(sid) {
                new_text.insert(sid.clone(), text.clone());
            }
        }

        Ok(Self {
            sample_ids: sample_ids.to_vec(),
            column_names: self.column_names.clone(),
            data: new_data,
            column_types: self.column_types.clone(),
            numeric_text: new_text,
            sample_id_column: self.sample_id_column.clone(),
            id_source: self.id_source,
        })
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

fn cell(row: &[String], col: usize) -> Option<String> {
    row.get(col)
        .map(|s| s.trim())
        .filter(|s| !is_missing_token(s))
        .map(|s| s.to_string())
}

fn is_missing_token(s: &str) -> bool {
    s.is_empty() || s == "NA" || s == "na" || s == "NaN"
}
