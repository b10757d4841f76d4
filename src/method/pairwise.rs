//! Pairwise log-ratio W statistic.
//!
//! For every feature `i`, the log-ratio against each other feature `j` is
//! tested for a group effect (Welch for two groups, one-way ANOVA for more).
//! `W[i]` counts the partners with p < alpha. The cost is quadratic in the
//! number of features; the outer loop runs in parallel and each worker
//! writes only its own feature's counter.

use super::{group_means, require_groups, DaMethod};
use crate::config::{DenominatorMode, MethodKind, DEFAULT_ALPHA, DEFAULT_PAIRWISE_CUTOFF};
use crate::data::{FeatureResult, FeatureStats, MethodResult};
use crate::error::Result;
use crate::filter::AlignedData;
use crate::logging::LogSink;
use crate::normalize::log_ratio;
use crate::test::group_difference;
use crate::zero::{prepare, Pseudocount, LOG_RATIO_PSEUDOCOUNT};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Features between progress messages.
const PROGRESS_INTERVAL: usize = 50;

/// Pairwise log-ratio test over all feature pairs.
#[derive(Debug, Clone)]
pub struct PairwiseLogRatioTest {
    /// Threshold for each pairwise test.
    pub alpha: f64,
    /// W ratio above which a feature is flagged.
    pub cutoff: f64,
}

impl Default for PairwiseLogRatioTest {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA, DEFAULT_PAIRWISE_CUTOFF)
    }
}

impl PairwiseLogRatioTest {
    pub fn new(alpha: f64, cutoff: f64) -> Self {
        Self { alpha, cutoff }
    }

    /// Number of partners `j != i` whose log-ratio with `i` differs by group.
    fn w_statistic(&self, data: &DMatrix<f64>, i: usize, groups: &[Vec<usize>]) -> usize {
        (0..data.nrows())
            .filter(|&j| j != i)
            .filter(|&j| {
                let ratio = log_ratio(data, i, j);
                let split: Vec<Vec<f64>> = groups
                    .iter()
                    .map(|cols| cols.iter().map(|&k| ratio[k]).collect())
                    .collect();
                group_difference(&split).rejects(self.alpha)
            })
            .count()
    }
}

/// W normalized by the number of possible partners.
pub fn w_ratio(w: usize, n_features: usize) -> f64 {
    if n_features > 1 {
        w as f64 / (n_features - 1) as f64
    } else {
        0.0
    }
}

impl DaMethod for PairwiseLogRatioTest {
    fn kind(&self) -> MethodKind {
        MethodKind::PairwiseLogRatio
    }

    fn run(
        &self,
        aligned: &AlignedData,
        denom: DenominatorMode,
        sink: &dyn LogSink,
    ) -> Result<MethodResult> {
        require_groups(self.kind(), &aligned.groups, None)?;

        let handled = prepare(
            &aligned.abundance,
            denom,
            Pseudocount::Fixed(LOG_RATIO_PSEUDOCOUNT),
            sink,
        )?;
        let groups = aligned.groups.group_indices();
        let n_features = handled.n_features();

        sink.info(&format!(
            "Pairwise log-ratio test: {} features ({} comparisons), {} groups",
            n_features,
            n_features * n_features.saturating_sub(1),
            groups.len()
        ));

        let done = AtomicUsize::new(0);
        let w: Vec<usize> = (0..n_features)
            .into_par_iter()
            .map(|i| {
                let w_i = self.w_statistic(&handled.data, i, &groups);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % PROGRESS_INTERVAL == 0 {
                    sink.debug(&format!("Processed {}/{} features", finished, n_features));
                }
                w_i
            })
            .collect();

        let means = group_means(&handled.table, &aligned.groups);
        let rows = handled
            .table
            .feature_ids()
            .iter()
            .enumerate()
            .map(|(i, fid)| {
                let ratio = w_ratio(w[i], n_features);
                FeatureResult {
                    feature_id: fid.clone(),
                    stats: FeatureStats::Pairwise {
                        w: w[i],
                        w_ratio: ratio,
                        significant: ratio > self.cutoff,
                    },
                    group_means: means[i].clone(),
                }
            })
            .collect();

        Ok(MethodResult::new(
            self.kind(),
            aligned.groups.levels().to_vec(),
            rows,
        ))
    }
}
