//! Design matrix construction for the group-effect regression.

use crate::data::{Metadata, Variable, VariableType};
use crate::error::{DaError, Result};
use nalgebra::DMatrix;

/// Name of the intercept coefficient.
pub const INTERCEPT: &str = "(Intercept)";

/// A treatment-coded design matrix: intercept, group dummies, then covariates.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// The design matrix (samples × coefficients).
    matrix: DMatrix<f64>,
    /// Names of the coefficients (columns).
    coefficient_names: Vec<String>,
    /// Sample IDs (rows).
    sample_ids: Vec<String>,
    /// Group column the dummies were built from.
    group_col: String,
    /// Reference (omitted) level of the group column.
    reference_level: String,
}

impl DesignMatrix {
    /// Build `~ group_col + covariates...` for the samples of `metadata`, in order.
    ///
    /// The group column is always dummy coded against its alphabetically first
    /// level. Continuous covariates enter as a single column; categorical
    /// covariates are dummy coded the same way as the group. Missing covariate
    /// values are an error; callers restrict `metadata` to complete cases.
    pub fn for_groups(metadata: &Metadata, group_col: &str, covariates: &[String]) -> Result<Self> {
        let sample_ids = metadata.sample_ids().to_vec();
        let n_samples = sample_ids.len();

        let group_levels = metadata.levels(group_col)?;
        if group_levels.len() < 2 {
            return Err(DaError::InsufficientGroups {
                method: "group regression".to_string(),
                required: "at least 2".to_string(),
                found: group_levels.len(),
            });
        }

        let mut coefficient_names = vec![INTERCEPT.to_string()];
        let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n_samples]];

        let group_values = metadata.column(group_col)?;
        for (name, col) in dummy_columns(group_col, &group_values, &group_levels) {
            coefficient_names.push(name);
            columns.push(col);
        }

        for covariate in covariates {
            if covariate == group_col {
                continue;
            }
            let values = metadata.column(covariate)?;
            if let Some(pos) = values.iter().position(|v| v.is_missing()) {
                return Err(DaError::InvalidParameter(format!(
                    "Covariate '{}' is missing for sample '{}'",
                    covariate, sample_ids[pos]
                )));
            }
            match metadata.column_type(covariate) {
                Some(VariableType::Continuous) => {
                    coefficient_names.push(covariate.clone());
                    columns.push(values.iter().map(|v| v.as_continuous().unwrap_or(0.0)).collect());
                }
                Some(VariableType::Categorical) | None => {
                    let levels = metadata.levels(covariate)?;
                    for (name, col) in dummy_columns(covariate, &values, &levels) {
                        coefficient_names.push(name);
                        columns.push(col);
                    }
                }
            }
        }

        let n_coef = columns.len();
        let mut matrix = DMatrix::zeros(n_samples, n_coef);
        for (col_idx, col) in columns.iter().enumerate() {
            for (row_idx, &val) in col.iter().enumerate() {
                matrix[(row_idx, col_idx)] = val;
            }
        }

        Ok(Self {
            matrix,
            coefficient_names,
            sample_ids,
            group_col: group_col.to_string(),
            reference_level: group_levels[0].clone(),
        })
    }

    /// Get the design matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Get coefficient names.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns).
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Reference level of the group column.
    pub fn reference_level(&self) -> &str {
        &self.reference_level
    }

    /// Index and name of the first non-reference group coefficient.
    pub fn group_coefficient(&self) -> Option<(usize, &str)> {
        self.coefficient_names
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, name)| name.starts_with(&self.group_col))
            .map(|(i, name)| (i, name.as_str()))
    }

    /// Get the index of a coefficient by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }
}

/// Treatment-coded dummy columns for every level except the first.
fn dummy_columns(var_name: &str, values: &[&Variable], levels: &[String]) -> Vec<(String, Vec<f64>)> {
    levels
        .iter()
        .skip(1)
        .map(|level| {
            let col = values
                .iter()
                .map(|v| match v.as_label() {
                    Some(label) if &label == level => 1.0,
                    _ => 0.0,
                })
                .collect();
            (format!("{}{}", var_name, level), col)
        })
        .collect()
}
