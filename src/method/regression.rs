//! CLR regression with a per-sample offset correction.
//!
//! The log abundances of each sample are centered on that sample's mean log
//! value, which is a simplified per-sample bias correction, and then every
//! feature is regressed on the group factor plus covariates. The effect is
//! the coefficient of the first non-reference group level.

use super::{group_means, require_groups, DaMethod};
use crate::config::{DenominatorMode, MethodKind};
use crate::correct::correct_bh;
use crate::data::{DesignMatrix, FeatureResult, FeatureStats, Metadata, MethodResult};
use crate::error::{DaError, Result};
use crate::filter::AlignedData;
use crate::logging::LogSink;
use crate::model::model_lm;
use crate::normalize::norm_clr;
use crate::test::test_wald;
use crate::zero::{prepare, Pseudocount, LOG_RATIO_PSEUDOCOUNT};

/// Per-feature linear model on offset-corrected log abundances.
#[derive(Debug, Clone, Default)]
pub struct BiasCorrectedRegression {
    /// Metadata columns added to the model after the group term.
    pub covariates: Vec<String>,
}

impl BiasCorrectedRegression {
    pub fn new(covariates: Vec<String>) -> Self {
        Self { covariates }
    }
}

impl DaMethod for BiasCorrectedRegression {
    fn kind(&self) -> MethodKind {
        MethodKind::BiasCorrectedRegression
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

        let keep = complete_cases(&aligned.metadata, &self.covariates)?;
        if keep.len() < aligned.metadata.n_samples() {
            let dropped: Vec<&str> = aligned
                .metadata
                .sample_ids()
                .iter()
                .enumerate()
                .filter(|(j, _)| !keep.contains(j))
                .map(|(_, sid)| sid.as_str())
                .collect();
            sink.warn(&format!(
                "Regression: {} sample(s) with missing covariate values excluded: {}",
                dropped.len(),
                dropped.join(", ")
            ));
        }
        let sample_ids: Vec<String> = keep
            .iter()
            .map(|&j| handled.table.sample_ids()[j].clone())
            .collect();
        let metadata = aligned.metadata.subset_samples(&sample_ids)?;

        let transformed = norm_clr(
            &handled.data.select_columns(keep.iter()),
            handled.table.feature_ids().to_vec(),
            sample_ids,
        )?;

        let design = DesignMatrix::for_groups(&metadata, &aligned.group_col, &self.covariates)?;
        let coefficient = design
            .group_coefficient()
            .map(|(_, name)| name.to_string())
            .ok_or_else(|| DaError::Numerical("Design matrix has no group coefficient".to_string()))?;
        sink.info(&format!(
            "Regression: {} features, model ~ {}{}, testing '{}' (reference '{}')",
            transformed.n_features(),
            aligned.group_col,
            self.covariates
                .iter()
                .map(|c| format!(" + {}", c))
                .collect::<String>(),
            coefficient,
            design.reference_level()
        ));

        let fit = model_lm(&transformed, &design)?;
        for failure in &fit.failures {
            sink.warn(&format!(
                "Regression failed for feature '{}': {}; omitted",
                failure.feature_id, failure.reason
            ));
        }

        let wald = test_wald(&fit, &coefficient)?;
        let bh = correct_bh(&wald.p_values());
        let means = group_means(&handled.table, &aligned.groups);

        let rows = wald
            .results
            .iter()
            .zip(bh.q_values.iter())
            .filter_map(|(w, &q_value)| {
                let i = handled.table.feature_index(&w.feature_id)?;
                Some(FeatureResult {
                    feature_id: w.feature_id.clone(),
                    stats: FeatureStats::Test {
                        effect_size: w.estimate,
                        p_value: w.p_value,
                        q_value,
                    },
                    group_means: means[i].clone(),
                })
            })
            .collect();

        Ok(MethodResult::new(
            self.kind(),
            aligned.groups.levels().to_vec(),
            rows,
        ))
    }
}

/// Indices of samples with a value in every covariate.
fn complete_cases(metadata: &Metadata, covariates: &[String]) -> Result<Vec<usize>> {
    let columns = covariates
        .iter()
        .map(|c| metadata.column(c))
        .collect::<Result<Vec<_>>>()?;
    Ok((0..metadata.n_samples())
        .filter(|&j| columns.iter().all(|col| !col[j].is_missing()))
        .collect())
}
