//! Dirichlet Monte-Carlo CLR test.
//!
//! Each draw resamples every sample's composition from a Dirichlet
//! distribution, CLR-transforms it, and runs Welch's t-test per feature.
//! Per-feature effect sizes and p-values are then summarized by their
//! median across draws and corrected with Benjamini-Hochberg.

use super::{group_means, require_groups, DaMethod};
use crate::config::{DenominatorMode, MethodKind, DEFAULT_MC_SAMPLES};
use crate::correct::correct_bh;
use crate::data::{FeatureResult, FeatureStats, MethodResult};
use crate::error::{DaError, Result};
use crate::filter::AlignedData;
use crate::logging::LogSink;
use crate::normalize::clr;
use crate::test::welch_t_test;
use crate::zero::{prepare, Pseudocount};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma};
use rayon::prelude::*;

/// Offset added to every scaled draw before the CLR.
const DRAW_OFFSET: f64 = 0.5;

/// Two-group Dirichlet Monte-Carlo test.
#[derive(Debug, Clone)]
pub struct MonteCarloTest {
    /// Number of Dirichlet draws.
    pub mc_samples: usize,
    /// Base seed; draw `d` uses `seed + d`.
    pub seed: Option<u64>,
}

impl Default for MonteCarloTest {
    fn default() -> Self {
        Self::new(DEFAULT_MC_SAMPLES, None)
    }
}

/// Per-draw statistics, `[feature]`.
struct DrawStats {
    effects: Vec<f64>,
    p_values: Vec<f64>,
}

impl MonteCarloTest {
    pub fn new(mc_samples: usize, seed: Option<u64>) -> Self {
        Self { mc_samples, seed }
    }

    /// One Dirichlet instance of the whole matrix, scaled by column totals.
    fn draw_instance(data: &DMatrix<f64>, totals: &[f64], rng: &mut StdRng) -> Result<DMatrix<f64>> {
        let (n_features, n_samples) = data.shape();
        let mut instance = DMatrix::zeros(n_features, n_samples);
        let mut gammas = vec![0.0; n_features];

        for j in 0..n_samples {
            let mut sum = 0.0;
            for (i, g) in gammas.iter_mut().enumerate() {
                let gamma = Gamma::new(data[(i, j)], 1.0).map_err(|e| {
                    DaError::Numerical(format!(
                        "Invalid Dirichlet parameter {} at ({}, {}): {}",
                        data[(i, j)],
                        i,
                        j,
                        e
                    ))
                })?;
                *g = gamma.sample(rng);
                sum += *g;
            }
            for (i, g) in gammas.iter().enumerate() {
                let share = if sum > 0.0 { g / sum } else { 0.0 };
                instance[(i, j)] = share * totals[j] + DRAW_OFFSET;
            }
        }
        Ok(instance)
    }

    fn run_draw(
        data: &DMatrix<f64>,
        totals: &[f64],
        group1: &[usize],
        group2: &[usize],
        seed: u64,
    ) -> Result<DrawStats> {
        let mut rng = StdRng::seed_from_u64(seed);
        let instance = Self::draw_instance(data, totals, &mut rng)?;
        let transformed = clr(&instance)?;

        let n_features = transformed.nrows();
        let mut effects = Vec::with_capacity(n_features);
        let mut p_values = Vec::with_capacity(n_features);
        for i in 0..n_features {
            let x: Vec<f64> = group1.iter().map(|&j| transformed[(i, j)]).collect();
            let y: Vec<f64> = group2.iter().map(|&j| transformed[(i, j)]).collect();
            effects.push(mean(&x) - mean(&y));
            p_values.push(welch_t_test(&x, &y).p_value);
        }
        Ok(DrawStats { effects, p_values })
    }
}

impl DaMethod for MonteCarloTest {
    fn kind(&self) -> MethodKind {
        MethodKind::MonteCarlo
    }

    fn run(
        &self,
        aligned: &AlignedData,
        denom: DenominatorMode,
        sink: &dyn LogSink,
    ) -> Result<MethodResult> {
        require_groups(self.kind(), &aligned.groups, Some(2))?;
        if self.mc_samples == 0 {
            return Err(DaError::InvalidParameter(
                "mc_samples must be at least 1".to_string(),
            ));
        }

        let handled = prepare(&aligned.abundance, denom, Pseudocount::HalfMinimum, sink)?;
        let indices = aligned.groups.group_indices();
        let (group1, group2) = (&indices[0], &indices[1]);
        let levels = aligned.groups.levels();

        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        sink.info(&format!(
            "Monte-Carlo test: {} features, {} draws, seed {}, effect = {} - {}",
            handled.n_features(),
            self.mc_samples,
            seed,
            levels[0],
            levels[1]
        ));

        let totals: Vec<f64> = handled.data.column_iter().map(|c| c.sum()).collect();

        let draws: Vec<DrawStats> = (0..self.mc_samples)
            .into_par_iter()
            .map(|d| {
                Self::run_draw(&handled.data, &totals, group1, group2, seed.wrapping_add(d as u64))
            })
            .collect::<Result<Vec<_>>>()?;

        let n_features = handled.n_features();
        let mut effects = Vec::with_capacity(n_features);
        let mut p_values = Vec::with_capacity(n_features);
        for i in 0..n_features {
            effects.push(median(draws.iter().map(|d| d.effects[i]).collect()));
            p_values.push(median(draws.iter().map(|d| d.p_values[i]).collect()));
        }

        let bh = correct_bh(&p_values);
        let means = group_means(&handled.table, &aligned.groups);

        let rows = handled
            .table
            .feature_ids()
            .iter()
            .enumerate()
            .map(|(i, fid)| FeatureResult {
                feature_id: fid.clone(),
                stats: FeatureStats::Test {
                    effect_size: effects[i],
                    p_value: p_values[i],
                    q_value: bh.q_values[i],
                },
                group_means: means[i].clone(),
            })
            .collect();

        Ok(MethodResult::new(self.kind(), levels.to_vec(), rows))
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of the defined values; NaN when none are defined.
fn median(mut values: Vec<f64>) -> f64 {
    values.retain(|v| !v.is_nan());
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AbundanceTable, Metadata};
    use crate::filter::align_tables;
    use crate::logging::LogCollector;
    use approx::assert_relative_eq;

    fn create_aligned(groups: &[&str]) -> AlignedData {
        let n = groups.len();
        let sample_ids: Vec<String> = (1..=n).map(|i| format!("S{}", i)).collect();
        let sid_refs: Vec<&str> = sample_ids.iter().map(|s| s.as_str()).collect();
        // f1 high in group A, f2 high in group B
        let rows: Vec<Vec<f64>> = vec![
            groups.iter().map(|g| if *g == "A" { 500.0 } else { 20.0 }).collect(),
            groups.iter().map(|g| if *g == "A" { 20.0 } else { 500.0 }).collect(),
            vec![200.0; n],
            vec![100.0; n],
        ];
        let abundance = AbundanceTable::from_rows(&rows, &["f1", "f2", "f3", "f4"], &sid_refs).unwrap();

        let header = vec!["SampleID".to_string(), "Group".to_string()];
        let records: Vec<Vec<String>> = sample_ids
            .iter()
            .zip(groups.iter())
            .map(|(s, g)| vec![s.clone(), g.to_string()])
            .collect();
        let metadata = Metadata::from_records(header, records, None).unwrap();
        align_tables(&abundance, &metadata, "Group", None, &LogCollector::new()).unwrap()
    }

    #[test]
    fn test_median() {
        assert_relative_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_relative_eq!(median(vec![f64::NAN, 1.0, 5.0]), 3.0);
        assert!(median(vec![f64::NAN, f64::NAN]).is_nan());
    }

    #[test]
    fn test_monte_carlo_detects_shift() {
        let aligned = create_aligned(&["A", "A", "A", "A", "B", "B", "B", "B"]);
        let test = MonteCarloTest::new(16, Some(7));
        let result = test.run(&aligned, DenominatorMode::All, &LogCollector::new()).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.groups, vec!["A".to_string(), "B".to_string()]);

        let f1 = result.get("f1").unwrap();
        match f1.stats {
            FeatureStats::Test { effect_size, p_value, .. } => {
                // A minus B
                assert!(effect_size > 2.0);
                assert!(p_value < 0.01);
            }
            _ => panic!("expected test statistics"),
        }
        assert_eq!(f1.group_means, vec![500.0, 20.0]);

        let f2 = result.get("f2").unwrap();
        match f2.stats {
            FeatureStats::Test { effect_size, .. } => assert!(effect_size < -2.0),
            _ => panic!("expected test statistics"),
        }
    }

    #[test]
    fn test_monte_carlo_seeded_determinism() {
        let aligned = create_aligned(&["A", "A", "A", "B", "B", "B"]);
        let test = MonteCarloTest::new(8, Some(42));
        let first = test.run(&aligned, DenominatorMode::All, &LogCollector::new()).unwrap();
        let second = test.run(&aligned, DenominatorMode::All, &LogCollector::new()).unwrap();

        for (a, b) in first.rows.iter().zip(second.rows.iter()) {
            assert_eq!(a.feature_id, b.feature_id);
            assert_eq!(a.stats, b.stats);
        }
    }

    #[test]
    fn test_monte_carlo_logs_drawn_seed() {
        let aligned = create_aligned(&["A", "A", "B", "B"]);
        let sink = LogCollector::new();
        MonteCarloTest::new(2, None)
            .run(&aligned, DenominatorMode::All, &sink)
            .unwrap();
        assert!(sink.contains("seed"));
    }

    #[test]
    fn test_monte_carlo_requires_two_groups() {
        let aligned = create_aligned(&["A", "A", "B", "B", "C", "C"]);
        let err = MonteCarloTest::new(4, Some(1))
            .run(&aligned, DenominatorMode::All, &LogCollector::new())
            .unwrap_err();
        assert!(matches!(err, DaError::InsufficientGroups { found: 3, .. }));
    }
}
