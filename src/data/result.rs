//! Per-method result tables.

use crate::config::MethodKind;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;

/// Method-specific statistics for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureStats {
    /// Effect size with raw and BH-adjusted p-values (Monte-Carlo, regression).
    Test {
        effect_size: f64,
        p_value: f64,
        q_value: f64,
    },
    /// W statistic of the pairwise log-ratio test.
    Pairwise {
        w: usize,
        w_ratio: f64,
        significant: bool,
    },
}

/// Result for a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureResult {
    /// Feature identifier.
    pub feature_id: String,
    pub stats: FeatureStats,
    /// Mean raw abundance per group, parallel to [`MethodResult::groups`].
    pub group_means: Vec<f64>,
}

impl FeatureResult {
    /// q-value for tests that produce one.
    pub fn q_value(&self) -> Option<f64> {
        match self.stats {
            FeatureStats::Test { q_value, .. } => Some(q_value),
            FeatureStats::Pairwise { .. } => None,
        }
    }

    /// p-value for tests that produce one.
    pub fn p_value(&self) -> Option<f64> {
        match self.stats {
            FeatureStats::Test { p_value, .. } => Some(p_value),
            FeatureStats::Pairwise { .. } => None,
        }
    }

    /// Whether this feature crosses the method's significance rule.
    ///
    /// q-value based methods compare against `alpha`; NaN never qualifies.
    /// The pairwise test carries its own flag.
    pub fn is_significant(&self, alpha: f64) -> bool {
        match self.stats {
            FeatureStats::Test { q_value, .. } => q_value < alpha,
            FeatureStats::Pairwise { significant, .. } => significant,
        }
    }
}

/// The complete, immutable output of one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResult {
    pub method: MethodKind,
    /// Group labels in sorted order.
    pub groups: Vec<String>,
    pub rows: Vec<FeatureResult>,
}

impl MethodResult {
    /// Create a result with rows sorted by the method's natural order:
    /// ascending q-value (NaN last) or descending W.
    pub fn new(method: MethodKind, groups: Vec<String>, mut rows: Vec<FeatureResult>) -> Self {
        rows.sort_by(compare_rows);
        Self {
            method,
            groups,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the row of a specific feature.
    pub fn get(&self, feature_id: &str) -> Option<&FeatureResult> {
        self.rows.iter().find(|r| r.feature_id == feature_id)
    }

    /// Feature ids in row order.
    pub fn feature_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.feature_id.as_str()).collect()
    }

    /// The set of features crossing the significance rule.
    pub fn significant_features(&self, alpha: f64) -> BTreeSet<String> {
        self.rows
            .iter()
            .filter(|r| r.is_significant(alpha))
            .map(|r| r.feature_id.clone())
            .collect()
    }

    /// Column headers of the persisted table.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["feature".to_string()];
        match self.method {
            MethodKind::PairwiseLogRatio => {
                header.extend(["W", "W_ratio", "significant"].map(String::from));
            }
            MethodKind::MonteCarlo | MethodKind::BiasCorrectedRegression => {
                header.extend(["effect_size", "p_value", "q_value"].map(String::from));
            }
        }
        header.extend(self.groups.iter().map(|g| format!("mean_abundance_{}", g)));
        header
    }

    /// Write the table as comma-separated values.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.header())?;

        for row in &self.rows {
            let mut record = vec![row.feature_id.clone()];
            match &row.stats {
                FeatureStats::Test {
                    effect_size,
                    p_value,
                    q_value,
                } => {
                    record.push(format_float(*effect_size));
                    record.push(format_float(*p_value));
                    record.push(format_float(*q_value));
                }
                FeatureStats::Pairwise {
                    w,
                    w_ratio,
                    significant,
                } => {
                    record.push(w.to_string());
                    record.push(format_float(*w_ratio));
                    record.push(significant.to_string());
                }
            }
            record.extend(row.group_means.iter().map(|&m| format_float(m)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{}", v)
    }
}

/// Ascending with NaN sorted after every number.
pub(crate) fn cmp_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn compare_rows(a: &FeatureResult, b: &FeatureResult) -> Ordering {
    match (&a.stats, &b.stats) {
        (FeatureStats::Test { q_value: qa, p_value: pa, .. }, FeatureStats::Test { q_value: qb, p_value: pb, .. }) => {
            cmp_nan_last(*qa, *qb).then_with(|| cmp_nan_last(*pa, *pb))
        }
        (FeatureStats::Pairwise { w: wa, .. }, FeatureStats::Pairwise { w: wb, .. }) => wb.cmp(wa),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_row(id: &str, p: f64, q: f64) -> FeatureResult {
        FeatureResult {
            feature_id: id.to_string(),
            stats: FeatureStats::Test {
                effect_size: 1.0,
                p_value: p,
                q_value: q,
            },
            group_means: vec![1.0, 2.0],
        }
    }

    fn pairwise_row(id: &str, w: usize, significant: bool) -> FeatureResult {
        FeatureResult {
            feature_id: id.to_string(),
            stats: FeatureStats::Pairwise {
                w,
                w_ratio: w as f64 / 4.0,
                significant,
            },
            group_means: vec![3.0, 4.0],
        }
    }

    #[test]
    fn test_sorted_by_qvalue_nan_last() {
        let result = MethodResult::new(
            MethodKind::MonteCarlo,
            vec!["A".into(), "B".into()],
            vec![
                test_row("nan", f64::NAN, f64::NAN),
                test_row("high", 0.5, 0.6),
                test_row("low", 0.001, 0.003),
            ],
        );
        assert_eq!(result.feature_ids(), vec!["low", "high", "nan"]);
    }

    #[test]
    fn test_sorted_by_w_descending() {
        let result = MethodResult::new(
            MethodKind::PairwiseLogRatio,
            vec!["A".into(), "B".into()],
            vec![pairwise_row("f1", 1, false), pairwise_row("f2", 4, true), pairwise_row("f3", 2, false)],
        );
        assert_eq!(result.feature_ids(), vec!["f2", "f3", "f1"]);
    }

    #[test]
    fn test_significant_features() {
        let tests = MethodResult::new(
            MethodKind::BiasCorrectedRegression,
            vec!["A".into(), "B".into()],
            vec![
                test_row("f1", 0.001, 0.01),
                test_row("f2", 0.04, 0.05),
                test_row("f3", f64::NAN, f64::NAN),
            ],
        );
        let sig = tests.significant_features(0.05);
        assert_eq!(sig.into_iter().collect::<Vec<_>>(), vec!["f1".to_string()]);

        let pairwise = MethodResult::new(
            MethodKind::PairwiseLogRatio,
            vec!["A".into(), "B".into()],
            vec![pairwise_row("f1", 4, true), pairwise_row("f2", 0, false)],
        );
        assert_eq!(pairwise.significant_features(0.05).len(), 1);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let result = MethodResult::new(
            MethodKind::MonteCarlo,
            vec!["Control".into(), "Drug".into()],
            vec![test_row("f1", 0.01, 0.02), test_row("f2", f64::NAN, f64::NAN)],
        );
        result.to_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "feature,effect_size,p_value,q_value,mean_abundance_Control,mean_abundance_Drug"
        );
        assert_eq!(lines[1], "f1,1,0.01,0.02,1,2");
        assert_eq!(lines[2], "f2,1,NaN,NaN,1,2");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_pairwise_header() {
        let result = MethodResult::new(MethodKind::PairwiseLogRatio, vec!["x".into()], vec![]);
        assert_eq!(
            result.header(),
            vec!["feature", "W", "W_ratio", "significant", "mean_abundance_x"]
        );
        assert!(result.is_empty());
    }
}
