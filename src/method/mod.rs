//! Differential abundance methods.
//!
//! Every method consumes the same [`AlignedData`] and returns an immutable
//! [`MethodResult`]. Methods never share mutable state; each one performs its
//! own zero handling on a private copy of the aligned matrix.

pub mod monte_carlo;
pub mod pairwise;
pub mod regression;

pub use monte_carlo::MonteCarloTest;
pub use pairwise::PairwiseLogRatioTest;
pub use regression::BiasCorrectedRegression;

use crate::config::{AnalysisConfig, DenominatorMode, MethodKind};
use crate::data::{AbundanceTable, MethodResult};
use crate::error::{DaError, Result};
use crate::filter::{AlignedData, GroupAssignment};
use crate::logging::LogSink;

/// A differential abundance test.
pub trait DaMethod: Send + Sync {
    /// Which method this is.
    fn kind(&self) -> MethodKind;

    /// Run the test on aligned data.
    ///
    /// # Errors
    /// `InsufficientGroups` when the aligned data has a group count the
    /// method cannot handle; other errors are bugs in the input data.
    fn run(
        &self,
        aligned: &AlignedData,
        denom: DenominatorMode,
        sink: &dyn LogSink,
    ) -> Result<MethodResult>;
}

/// Build the implementation of `kind` from the run configuration.
pub fn method_for(kind: MethodKind, config: &AnalysisConfig) -> Box<dyn DaMethod> {
    match kind {
        MethodKind::MonteCarlo => Box::new(MonteCarloTest::new(
            config.monte_carlo.mc_samples,
            config.monte_carlo.seed,
        )),
        MethodKind::PairwiseLogRatio => Box::new(PairwiseLogRatioTest::new(
            config.alpha,
            config.pairwise.cutoff,
        )),
        MethodKind::BiasCorrectedRegression => {
            Box::new(BiasCorrectedRegression::new(config.covariates.clone()))
        }
    }
}

/// Mean raw abundance per feature for every group, `[feature][group]`.
pub(crate) fn group_means(table: &AbundanceTable, groups: &GroupAssignment) -> Vec<Vec<f64>> {
    let per_group: Vec<Vec<f64>> = groups
        .group_indices()
        .iter()
        .map(|cols| table.row_means_over(cols))
        .collect();
    (0..table.n_features())
        .map(|i| per_group.iter().map(|g| g[i]).collect())
        .collect()
}

/// Fail unless the aligned data has an acceptable number of groups.
pub(crate) fn require_groups(
    kind: MethodKind,
    groups: &GroupAssignment,
    exact: Option<usize>,
) -> Result<()> {
    let found = groups.n_groups();
    let (ok, required) = match exact {
        Some(n) => (found == n, format!("exactly {}", n)),
        None => (found >= 2, "at least 2".to_string()),
    };
    if ok {
        Ok(())
    } else {
        Err(DaError::InsufficientGroups {
            method: kind.name().to_string(),
            required,
            found,
        })
    }
}
