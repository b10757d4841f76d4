//! Centered Log-Ratio (CLR) transformation for compositional data.

use crate::error::{DaError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A transformed matrix with metadata about the transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformedMatrix {
    /// The transformed data (features × samples).
    #[serde(skip)]
    pub data: DMatrix<f64>,
    /// Feature identifiers.
    pub feature_ids: Vec<String>,
    /// Sample identifiers.
    pub sample_ids: Vec<String>,
    /// Name of the transformation applied.
    pub transformation: String,
    /// Per-sample log offset that was subtracted (mean of logs).
    pub log_offsets: Vec<f64>,
}

impl TransformedMatrix {
    /// Get the transformed value for a feature and sample.
    pub fn get(&self, feature: usize, sample: usize) -> f64 {
        self.data[(feature, sample)]
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Get a row (feature) as a vector.
    pub fn row(&self, feature: usize) -> Vec<f64> {
        self.data.row(feature).iter().cloned().collect()
    }

    /// Get reference to the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }
}

/// Natural log of every entry; all entries must be strictly positive.
pub fn log_transform(data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (n_features, n_samples) = data.shape();
    if n_features == 0 || n_samples == 0 {
        return Err(DaError::EmptyData(
            "Cannot log-transform an empty matrix".to_string(),
        ));
    }

    for j in 0..n_samples {
        for i in 0..n_features {
            let val = data[(i, j)];
            if !(val > 0.0 && val.is_finite()) {
                return Err(DaError::Numerical(format!(
                    "Log transform requires positive values; found {} at ({}, {})",
                    val, i, j
                )));
            }
        }
    }

    Ok(data.map(|x| x.ln()))
}

/// Per-sample (column) mean of an already log-transformed matrix.
fn column_log_means(log_data: &DMatrix<f64>) -> Vec<f64> {
    let n_features = log_data.nrows() as f64;
    (0..log_data.ncols())
        .into_par_iter()
        .map(|j| log_data.column(j).sum() / n_features)
        .collect()
}

/// Apply the CLR transform to a plain matrix.
///
/// For sample j: CLR(x_ij) = log(x_ij) - mean_k(log(x_kj)), so each column of
/// the output sums to zero up to rounding.
///
/// # Note
/// Input must have no zeros (replace them with a pseudocount first).
pub fn clr(data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (clr_data, _) = clr_with_offsets(data)?;
    Ok(clr_data)
}

fn clr_with_offsets(data: &DMatrix<f64>) -> Result<(DMatrix<f64>, Vec<f64>)> {
    let mut log_data = log_transform(data)?;
    let offsets = column_log_means(&log_data);
    for (j, mut column) in log_data.column_iter_mut().enumerate() {
        column.add_scalar_mut(-offsets[j]);
    }
    Ok((log_data, offsets))
}

/// Apply the CLR transform and keep identifiers alongside the values.
///
/// # Arguments
/// * `data` - Dense matrix with zeros already replaced
/// * `feature_ids` - Feature identifiers
/// * `sample_ids` - Sample identifiers
pub fn norm_clr(
    data: &DMatrix<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
) -> Result<TransformedMatrix> {
    if feature_ids.len() != data.nrows() {
        return Err(DaError::DimensionMismatch {
            expected: data.nrows(),
            actual: feature_ids.len(),
        });
    }
    if sample_ids.len() != data.ncols() {
        return Err(DaError::DimensionMismatch {
            expected: data.ncols(),
            actual: sample_ids.len(),
        });
    }

    let (clr_data, log_offsets) = clr_with_offsets(data)?;

    Ok(TransformedMatrix {
        data: clr_data,
        feature_ids,
        sample_ids,
        transformation: "CLR".to_string(),
        log_offsets,
    })
}

/// log(x_i / x_j) for two feature rows, across all samples.
pub fn log_ratio(data: &DMatrix<f64>, i: usize, j: usize) -> Vec<f64> {
    data.row(i)
        .iter()
        .zip(data.row(j).iter())
        .map(|(a, b)| (a / b).ln())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn create_test_data() -> (DMatrix<f64>, Vec<String>, Vec<String>) {
        // 3 features × 4 samples, zeros already replaced
        let data = DMatrix::from_row_slice(3, 4, &[
            10.5, 20.5, 15.5, 5.5,   // feature 0
            30.5, 40.5, 35.5, 25.5,  // feature 1
            5.5,  10.5, 8.5,  3.5,   // feature 2
        ]);
        let feature_ids = vec!["A".into(), "B".into(), "C".into()];
        let sample_ids = vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()];
        (data, feature_ids, sample_ids)
    }

    #[test]
    fn test_clr_basic() {
        let (data, feature_ids, sample_ids) = create_test_data();
        let result = norm_clr(&data, feature_ids, sample_ids).unwrap();

        assert_eq!(result.n_features(), 3);
        assert_eq!(result.n_samples(), 4);
        assert_eq!(result.transformation, "CLR");
    }

    #[test]
    fn test_clr_column_sums_zero() {
        let (data, _, _) = create_test_data();
        let result = clr(&data).unwrap();

        for j in 0..result.ncols() {
            assert_relative_eq!(result.column(j).sum(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_clr_log_offsets() {
        let (data, feature_ids, sample_ids) = create_test_data();
        let result = norm_clr(&data, feature_ids, sample_ids).unwrap();

        // offset = log of the geometric mean (10.5 * 30.5 * 5.5)^(1/3)
        let expected = (10.5_f64 * 30.5 * 5.5).powf(1.0 / 3.0).ln();
        assert_relative_eq!(result.log_offsets[0], expected, epsilon = 1e-10);
    }

    #[test]
    fn test_clr_manual_calculation() {
        let data = DMatrix::from_row_slice(2, 2, &[
            1.0, 4.0,  // feature 0
            4.0, 1.0,  // feature 1
        ]);
        let result = clr(&data).unwrap();

        // geometric mean of each sample is 2
        assert_relative_eq!(result[(0, 0)], -2.0_f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(result[(1, 0)], 2.0_f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(result[(0, 1)], 2.0_f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(result[(1, 1)], -2.0_f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_clr_rejects_zeros() {
        let data = DMatrix::from_row_slice(2, 2, &[
            1.0, 0.0,
            4.0, 1.0,
        ]);
        assert!(clr(&data).is_err());
    }

    #[test]
    fn test_clr_rejects_negative() {
        let data = DMatrix::from_row_slice(2, 2, &[
            1.0, -1.0,
            4.0, 1.0,
        ]);
        assert!(matches!(clr(&data), Err(DaError::Numerical(_))));
    }

    #[test]
    fn test_clr_dimension_mismatch() {
        let (data, _, sample_ids) = create_test_data();
        let result = norm_clr(&data, vec!["A".into()], sample_ids);
        assert!(matches!(result, Err(DaError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_log_ratio() {
        let (data, _, _) = create_test_data();
        let ratio = log_ratio(&data, 1, 0);

        assert_eq!(ratio.len(), 4);
        assert_relative_eq!(ratio[0], (30.5_f64 / 10.5).ln(), epsilon = 1e-12);
        // antisymmetric
        let reverse = log_ratio(&data, 0, 1);
        for (a, b) in ratio.iter().zip(reverse.iter()) {
            assert_relative_eq!(*a, -*b, epsilon = 1e-12);
        }
    }
}
