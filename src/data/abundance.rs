//! Dense abundance table for pathway and gene-family profiles.

use crate::error::{DaError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Identifier of the sentinel row holding reads not assigned to any feature.
pub const UNMAPPED_FEATURE: &str = "UNMAPPED";

/// A dense table of non-negative abundances.
///
/// Rows represent features (pathways/gene families), columns represent samples.
#[derive(Debug, Clone)]
pub struct AbundanceTable {
    /// Dense matrix (features × samples)
    data: DMatrix<f64>,
    /// Feature identifiers (row names)
    feature_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

impl AbundanceTable {
    /// Create a new table from a dense matrix and identifiers.
    ///
    /// Identifiers must be unique and every entry must be finite and non-negative.
    pub fn new(data: DMatrix<f64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(DaError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(DaError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        check_unique(&feature_ids)?;
        check_unique(&sample_ids)?;

        for i in 0..nrows {
            for j in 0..ncols {
                let v = data[(i, j)];
                if !v.is_finite() || v < 0.0 {
                    return Err(DaError::InvalidValue {
                        value: v.to_string(),
                        row: i,
                        col: j,
                    });
                }
            }
        }

        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Build from row-major nested values; convenient for small tables.
    pub fn from_rows(rows: &[Vec<f64>], feature_ids: &[&str], sample_ids: &[&str]) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut flat = Vec::with_capacity(rows.len() * n_samples);
        for row in rows {
            if row.len() != n_samples {
                return Err(DaError::DimensionMismatch {
                    expected: n_samples,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        Self::new(
            DMatrix::from_row_slice(rows.len(), n_samples, &flat),
            feature_ids.iter().map(|s| s.to_string()).collect(),
            sample_ids.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Load an abundance table from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the feature ID header)
    /// - Subsequent rows: feature ID followed by one value per sample
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .comment(None)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(DaError::EmptyData(
                "Abundance table must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut feature_ids = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != n_samples + 1 {
                return Err(DaError::DimensionMismatch {
                    expected: n_samples + 1,
                    actual: record.len(),
                });
            }
            feature_ids.push(record[0].trim().to_string());

            for (col_idx, raw) in record.iter().skip(1).enumerate() {
                let value: f64 = raw.trim().parse().map_err(|_| DaError::InvalidValue {
                    value: raw.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                values.push(value);
            }
        }

        if feature_ids.is_empty() {
            return Err(DaError::EmptyData("No features in abundance table".to_string()));
        }

        let data = DMatrix::from_row_slice(feature_ids.len(), n_samples, &values);
        Self::new(data, feature_ids, sample_ids)
    }

    /// Get the value at (row, col).
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get the underlying dense matrix.
    #[inline]
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Index of a feature by identifier.
    pub fn feature_index(&self, feature_id: &str) -> Option<usize> {
        self.feature_ids.iter().position(|f| f == feature_id)
    }

    /// Check whether the unmapped sentinel row is present.
    pub fn has_unmapped(&self) -> bool {
        self.feature_index(UNMAPPED_FEATURE).is_some()
    }

    /// Values of one feature across all samples.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().copied().collect()
    }

    /// Column sums (total abundance per sample).
    pub fn col_sums(&self) -> Vec<f64> {
        (0..self.n_samples())
            .into_par_iter()
            .map(|j| self.data.column(j).sum())
            .collect()
    }

    /// Smallest strictly positive entry, if any.
    pub fn min_nonzero(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|&v| v > 0.0)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
    }

    /// Subset the table to the given features (by index), in the given order.
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        for &idx in indices {
            if idx >= self.n_features() {
                return Err(DaError::InvalidParameter(format!(
                    "Feature index {} out of bounds",
                    idx
                )));
            }
        }
        let data = self.data.select_rows(indices);
        let feature_ids = indices.iter().map(|&i| self.feature_ids[i].clone()).collect();
        Self::new(data, feature_ids, self.sample_ids.clone())
    }

    /// Subset the table to the given samples (by index), in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        for &idx in indices {
            if idx >= self.n_samples() {
                return Err(DaError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    idx
                )));
            }
        }
        let data = self.data.select_columns(indices);
        let sample_ids = indices.iter().map(|&j| self.sample_ids[j].clone()).collect();
        Self::new(data, self.feature_ids.clone(), sample_ids)
    }

    /// Subset the table to the named samples, in the given order.
    pub fn select_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let lookup: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(j, s)| (s.as_str(), j))
            .collect();
        let indices = sample_ids
            .iter()
            .map(|sid| {
                lookup.get(sid.as_str()).copied().ok_or_else(|| {
                    DaError::InvalidParameter(format!("Sample '{}' not in abundance table", sid))
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        self.subset_samples(&indices)
    }

    /// Copy of the table without the named feature; unchanged if it is absent.
    pub fn without_feature(&self, feature_id: &str) -> Result<Self> {
        let keep: Vec<usize> = (0..self.n_features())
            .filter(|&i| self.feature_ids[i] != feature_id)
            .collect();
        self.subset_features(&keep)
    }

    /// Mean abundance of every feature over the given sample columns.
    pub fn row_means_over(&self, columns: &[usize]) -> Vec<f64> {
        if columns.is_empty() {
            return vec![f64::NAN; self.n_features()];
        }
        let n = columns.len() as f64;
        (0..self.n_features())
            .map(|i| columns.iter().map(|&j| self.data[(i, j)]).sum::<f64>() / n)
            .collect()
    }
}

fn check_unique(ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(DaError::DuplicateId(id.clone()));
        }
    }
    Ok(())
}
