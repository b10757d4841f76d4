//! Benjamini-Hochberg false discovery rate correction.

use serde::{Deserialize, Serialize};

/// Result of BH correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BhCorrected {
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Adjusted p-values (q-values), parallel to `p_values`.
    pub q_values: Vec<f64>,
    /// Number of defined p-values that entered the correction.
    pub n_tests: usize,
}

impl BhCorrected {
    /// Count significant results at a threshold.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.q_values.iter().filter(|&&q| q < alpha).count()
    }
}

/// Apply Benjamini-Hochberg FDR correction.
///
/// For the defined p-values sorted ascending, q[i] = min(p[i] * n / rank[i], q[i+1]),
/// capped at 1. NaN p-values get NaN q-values and do not count towards `n`.
///
/// # Arguments
/// * `p_values` - Raw p-values in feature order
///
/// # Returns
/// q-values in the same order.
pub fn correct_bh(p_values: &[f64]) -> BhCorrected {
    let mut q_values = vec![f64::NAN; p_values.len()];

    let mut indices: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    let n = indices.len();
    if n == 0 {
        return BhCorrected {
            p_values: p_values.to_vec(),
            q_values,
            n_tests: 0,
        };
    }

    indices.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n_f64 = n as f64;
    let mut running = p_values[indices[n - 1]].min(1.0);
    q_values[indices[n - 1]] = running;

    // Work backwards from the largest p-value
    for rank0 in (0..n - 1).rev() {
        let idx = indices[rank0];
        let adjusted = p_values[idx] * n_f64 / (rank0 + 1) as f64;
        running = adjusted.min(running).min(1.0);
        q_values[idx] = running;
    }

    BhCorrected {
        p_values: p_values.to_vec(),
        q_values,
        n_tests: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bh_basic() {
        let p_values = vec![0.01, 0.04, 0.03, 0.005];
        let corrected = correct_bh(&p_values);

        assert_eq!(corrected.n_tests, 4);
        assert_eq!(corrected.p_values, p_values);
    }

    #[test]
    fn test_bh_ordering() {
        let p_values = vec![0.04, 0.01, 0.03, 0.005];
        let corrected = correct_bh(&p_values);

        // 0.005 * 4 / 1
        assert_relative_eq!(corrected.q_values[3], 0.02, epsilon = 1e-10);
        // min(0.01 * 4 / 2, next)
        assert_relative_eq!(corrected.q_values[1], 0.02, epsilon = 1e-10);
    }

    #[test]
    fn test_bh_monotonicity() {
        let p_values = vec![0.5, 0.001, 0.1, 0.02, 0.01, 0.05];
        let corrected = correct_bh(&p_values);

        let mut pairs: Vec<(f64, f64)> = p_values
            .iter()
            .copied()
            .zip(corrected.q_values.iter().copied())
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        for w in pairs.windows(2) {
            assert!(w[1].1 >= w[0].1 - 1e-12);
        }
        for (p, q) in &pairs {
            assert!(q >= p);
        }
    }

    #[test]
    fn test_bh_bounded() {
        let corrected = correct_bh(&[0.5, 0.6, 0.7, 0.8, 0.9]);
        for q in &corrected.q_values {
            assert!(*q <= 1.0);
        }
    }

    #[test]
    fn test_bh_empty() {
        let corrected = correct_bh(&[]);
        assert_eq!(corrected.n_tests, 0);
        assert!(corrected.q_values.is_empty());
    }

    #[test]
    fn test_bh_single() {
        let corrected = correct_bh(&[0.05]);
        assert_eq!(corrected.n_tests, 1);
        assert_relative_eq!(corrected.q_values[0], 0.05, epsilon = 1e-10);
    }

    #[test]
    fn test_n_significant() {
        let corrected = correct_bh(&[0.001, 0.01, 0.03, 0.1, 0.5]);

        let n_sig_01 = corrected.n_significant(0.01);
        let n_sig_05 = corrected.n_significant(0.05);
        let n_sig_10 = corrected.n_significant(0.10);

        assert!(n_sig_01 <= n_sig_05);
        assert!(n_sig_05 <= n_sig_10);
    }

    #[test]
    fn test_bh_known_values() {
        let p_values = vec![0.005, 0.01, 0.02, 0.04, 0.1];
        let corrected = correct_bh(&p_values);

        // Rank 1: 0.005 * 5/1 = 0.025
        // Rank 2: 0.01 * 5/2 = 0.025
        // Rank 3: 0.02 * 5/3 = 0.0333
        // Rank 4: 0.04 * 5/4 = 0.05
        // Rank 5: 0.1 * 5/5 = 0.1
        assert_relative_eq!(corrected.q_values[0], 0.025, epsilon = 1e-10);
        assert_relative_eq!(corrected.q_values[1], 0.025, epsilon = 1e-10);
        assert_relative_eq!(corrected.q_values[2], 1.0 / 30.0, epsilon = 1e-10);
        assert_relative_eq!(corrected.q_values[3], 0.05, epsilon = 1e-10);
        assert_relative_eq!(corrected.q_values[4], 0.1, epsilon = 1e-10);
    }

    #[test]
    fn test_bh_nan_excluded() {
        let corrected = correct_bh(&[0.01, f64::NAN, 0.04]);

        assert_eq!(corrected.n_tests, 2);
        assert!(corrected.q_values[1].is_nan());
        // n = 2, not 3
        assert_relative_eq!(corrected.q_values[0], 0.02, epsilon = 1e-10);
        assert_relative_eq!(corrected.q_values[2], 0.04, epsilon = 1e-10);
    }
}
