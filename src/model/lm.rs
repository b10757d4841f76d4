//! Linear model fitting via OLS.

use crate::data::DesignMatrix;
use crate::error::{DaError, Result};
use crate::normalize::TransformedMatrix;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Results from fitting a linear model to a single feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmFitSingle {
    /// Feature identifier.
    pub feature_id: String,
    /// Estimated coefficients.
    pub coefficients: Vec<f64>,
    /// Standard errors of coefficients.
    pub std_errors: Vec<f64>,
    /// Residual standard error (sigma).
    pub sigma: f64,
    /// R-squared.
    pub r_squared: f64,
    /// Degrees of freedom (residual).
    pub df_residual: usize,
    /// Largest absolute response value, the scale for exact-fit checks.
    pub response_scale: f64,
}

impl LmFitSingle {
    /// Get coefficient by index.
    pub fn get_coefficient(&self, index: usize) -> Option<f64> {
        self.coefficients.get(index).copied()
    }

    /// Get standard error by index.
    pub fn get_std_error(&self, index: usize) -> Option<f64> {
        self.std_errors.get(index).copied()
    }
}

/// A feature whose model could not be fitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmFailure {
    pub feature_id: String,
    pub reason: String,
}

/// Results from fitting linear models to all features.
#[derive(Debug, Clone)]
pub struct LmFit {
    /// Successful fits, in feature order.
    pub fits: Vec<LmFitSingle>,
    /// Features that could not be fitted.
    pub failures: Vec<LmFailure>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
    /// Number of samples.
    pub n_samples: usize,
}

impl LmFit {
    /// Get the fit for a specific feature by ID.
    pub fn get_feature(&self, feature_id: &str) -> Option<&LmFitSingle> {
        self.fits.iter().find(|f| f.feature_id == feature_id)
    }

    /// Get coefficient index by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Number of successfully fitted features.
    pub fn n_features(&self) -> usize {
        self.fits.len()
    }

    /// Number of coefficients (including intercept).
    pub fn n_coefficients(&self) -> usize {
        self.coefficient_names.len()
    }
}

/// Fit linear models to transformed abundance data.
///
/// Fits OLS regression for each feature against the design matrix using a
/// shared (X'X)^-1. A problem with the design (saturated or singular) or
/// with a feature's values fails that feature only; failures are returned
/// in [`LmFit::failures`] instead of aborting the whole fit.
///
/// # Arguments
/// * `transformed` - CLR or other transformed abundance data
/// * `design` - Design matrix with rows in the same sample order
///
/// # Errors
/// `DimensionMismatch` if the design and data disagree on the sample count.
pub fn model_lm(transformed: &TransformedMatrix, design: &DesignMatrix) -> Result<LmFit> {
    let n_features = transformed.n_features();
    let n_samples = transformed.n_samples();

    if design.n_samples() != n_samples {
        return Err(DaError::DimensionMismatch {
            expected: n_samples,
            actual: design.n_samples(),
        });
    }

    let x = design.matrix();
    let xtx_inv = invert_gram(x);

    let outcomes: Vec<Result<LmFitSingle>> = (0..n_features)
        .into_par_iter()
        .map(|i| {
            let xtx_inv = xtx_inv.as_ref().map_err(|e| DaError::Numerical(e.clone()))?;
            fit_single_feature(&transformed.row(i), &transformed.feature_ids[i], x, xtx_inv)
        })
        .collect();

    let mut fits = Vec::with_capacity(n_features);
    let mut failures = Vec::new();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(fit) => fits.push(fit),
            Err(e) => failures.push(LmFailure {
                feature_id: transformed.feature_ids[i].clone(),
                reason: e.to_string(),
            }),
        }
    }

    Ok(LmFit {
        fits,
        failures,
        coefficient_names: design.coefficient_names().to_vec(),
        n_samples,
    })
}

/// (X'X)^-1, or the reason it does not exist.
fn invert_gram(x: &DMatrix<f64>) -> std::result::Result<DMatrix<f64>, String> {
    let (n_samples, n_coef) = x.shape();
    if n_samples <= n_coef {
        return Err(format!(
            "Model is saturated ({} samples for {} coefficients)",
            n_samples, n_coef
        ));
    }
    let xtx = x.transpose() * x;
    xtx.try_inverse()
        .ok_or_else(|| "Design matrix is singular (X'X not invertible)".to_string())
}

/// Fit a single feature using pre-computed (X'X)^-1.
pub fn fit_single_feature(
    y: &[f64],
    feature_id: &str,
    x: &DMatrix<f64>,
    xtx_inv: &DMatrix<f64>,
) -> Result<LmFitSingle> {
    let (n_samples, n_coef) = x.shape();
    if y.len() != n_samples {
        return Err(DaError::DimensionMismatch {
            expected: n_samples,
            actual: y.len(),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(DaError::Numerical(format!(
            "Feature '{}' has non-finite transformed values",
            feature_id
        )));
    }
    let df_residual = n_samples.saturating_sub(n_coef);
    if df_residual == 0 {
        return Err(DaError::Numerical(
            "Model is saturated (n_samples <= n_coefficients)".to_string(),
        ));
    }

    let y_vec = DVector::from_column_slice(y);

    // beta = (X'X)^-1 X'y
    let xty = x.transpose() * &y_vec;
    let beta = xtx_inv * xty;
    let coefficients: Vec<f64> = beta.iter().cloned().collect();

    let y_hat = x * &beta;
    let residuals = &y_vec - &y_hat;
    let rss: f64 = residuals.iter().map(|e| e * e).sum();
    let sigma = (rss / df_residual as f64).sqrt();

    // SE = sigma * sqrt(diag((X'X)^-1))
    let std_errors: Vec<f64> = (0..n_coef)
        .map(|j| sigma * xtx_inv[(j, j)].sqrt())
        .collect();

    if coefficients.iter().chain(std_errors.iter()).any(|v| !v.is_finite()) {
        return Err(DaError::Numerical(format!(
            "Non-finite estimates for feature '{}'",
            feature_id
        )));
    }

    let y_mean = y.iter().sum::<f64>() / n_samples as f64;
    let tss: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
    let response_scale = y.iter().fold(0.0_f64, |m, v| m.max(v.abs()));

    Ok(LmFitSingle {
        feature_id: feature_id.to_string(),
        coefficients,
        std_errors,
        sigma,
        r_squared,
        df_residual,
        response_scale,
    })
}
