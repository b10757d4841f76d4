//! Pseudocount replacement for zero handling.

use crate::config::DenominatorMode;
use crate::data::{AbundanceTable, UNMAPPED_FEATURE};
use crate::error::{DaError, Result};
use crate::logging::LogSink;
use nalgebra::DMatrix;

/// Fixed pseudocount used by the log-ratio methods.
pub const LOG_RATIO_PSEUDOCOUNT: f64 = 0.5;

/// How the value substituted for zeros is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pseudocount {
    /// Half of the smallest non-zero entry of the matrix.
    HalfMinimum,
    /// A fixed positive constant.
    Fixed(f64),
}

impl Pseudocount {
    /// Resolve the policy to a concrete value for `table`.
    pub fn resolve(&self, table: &AbundanceTable) -> Result<f64> {
        let value = match *self {
            Pseudocount::HalfMinimum => half_min_pseudocount(table),
            Pseudocount::Fixed(v) => v,
        };
        if !(value.is_finite() && value > 0.0) {
            return Err(DaError::InvalidParameter(format!(
                "Pseudocount must be positive, got {}",
                value
            )));
        }
        Ok(value)
    }
}

/// Calculate a data-adaptive pseudocount based on the minimum non-zero value.
///
/// Returns min(non-zero values) / 2. An all-zero table falls back to
/// [`LOG_RATIO_PSEUDOCOUNT`].
pub fn half_min_pseudocount(table: &AbundanceTable) -> f64 {
    table
        .min_nonzero()
        .map_or(LOG_RATIO_PSEUDOCOUNT, |m| m / 2.0)
}

/// Replace zero entries with `pseudocount`; non-zero entries are unchanged.
///
/// # Arguments
/// * `data` - Non-negative matrix (features × samples)
/// * `pseudocount` - Strictly positive substitute value
pub fn replace_zeros(data: &DMatrix<f64>, pseudocount: f64) -> Result<DMatrix<f64>> {
    if !(pseudocount.is_finite() && pseudocount > 0.0) {
        return Err(DaError::InvalidParameter(
            "Pseudocount must be positive".to_string(),
        ));
    }
    Ok(data.map(|v| if v == 0.0 { pseudocount } else { v }))
}

/// A table ready for log-based methods.
#[derive(Debug, Clone)]
pub struct ZeroHandled {
    /// Raw values after the optional unmapped removal; group means come from here.
    pub table: AbundanceTable,
    /// Values with zeros replaced (features × samples, same order as `table`).
    pub data: DMatrix<f64>,
    /// The value substituted for zeros.
    pub pseudocount: f64,
}

impl ZeroHandled {
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }
}

/// Drop the unmapped row if requested, then replace zeros per `policy`.
///
/// The pseudocount is computed after the unmapped row is removed, so that row
/// never influences it.
pub fn prepare(
    table: &AbundanceTable,
    denom: DenominatorMode,
    policy: Pseudocount,
    sink: &dyn LogSink,
) -> Result<ZeroHandled> {
    let table = match denom {
        DenominatorMode::UnmappedExcluded if table.has_unmapped() => {
            sink.debug(&format!("Removing '{}' feature before zero handling", UNMAPPED_FEATURE));
            table.without_feature(UNMAPPED_FEATURE)?
        }
        _ => table.clone(),
    };
    if table.n_features() == 0 {
        return Err(DaError::EmptyData(
            "No features left after zero handling".to_string(),
        ));
    }

    if policy == Pseudocount::HalfMinimum && table.min_nonzero().is_none() {
        sink.warn("Abundance table has no non-zero entries; using fallback pseudocount");
    }
    let pseudocount = policy.resolve(&table)?;
    let data = replace_zeros(table.data(), pseudocount)?;
    sink.debug(&format!("Replaced zeros with pseudocount {}", pseudocount));

    Ok(ZeroHandled {
        table,
        data,
        pseudocount,
    })
}
