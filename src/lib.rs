//! Compositional Differential Abundance Library
//!
//! Tests which features (pathways, gene families, taxa) differ in abundance
//! between sample groups while respecting the compositional nature of
//! relative-abundance tables.
//!
//! # Overview
//!
//! - **data**: Abundance tables, sample metadata, design matrices, results
//! - **filter**: Sample alignment and group selection
//! - **zero**: Zero handling (pseudocount replacement)
//! - **normalize**: CLR and pairwise log-ratio transforms
//! - **model**: Per-feature linear models
//! - **test**: Welch t-test, one-way ANOVA, Wald test
//! - **correct**: Multiple testing correction (Benjamini-Hochberg)
//! - **method**: Monte-Carlo, pairwise log-ratio and bias-corrected regression tests
//! - **pipeline**: Orchestration and cross-method comparison
//!
//! # Example
//!
//! ```no_run
//! use compositional_da::prelude::*;
//!
//! let config = AnalysisConfig::new()
//!     .group_col("Group")
//!     .denom(DenominatorMode::UnmappedExcluded)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let report = run_from_files(
//!     "pathabundance.tsv",
//!     "metadata.csv",
//!     &config,
//!     "DifferentialAbundance",
//!     &LogFacade,
//! )
//! .unwrap();
//! assert!(report.success());
//! ```

pub mod config;
pub mod correct;
pub mod data;
pub mod error;
pub mod filter;
pub mod logging;
pub mod method;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod test;
pub mod zero;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::config::{AnalysisConfig, DenominatorMode, MethodKind};
    pub use crate::correct::correct_bh;
    pub use crate::data::{
        AbundanceTable, DesignMatrix, FeatureResult, FeatureStats, Metadata, MethodResult,
        UNMAPPED_FEATURE,
    };
    pub use crate::error::{DaError, Result};
    pub use crate::filter::{align_tables, AlignedData, GroupAssignment};
    pub use crate::logging::{LogCollector, LogFacade, LogSink};
    pub use crate::method::{
        method_for, BiasCorrectedRegression, DaMethod, MonteCarloTest, PairwiseLogRatioTest,
    };
    pub use crate::normalize::{clr, log_ratio, norm_clr};
    pub use crate::pipeline::{
        run_analysis, run_from_files, AnalysisReport, MethodComparison, MethodOutcome,
        Orchestrator,
    };
    pub use crate::test::{one_way_anova, welch_t_test};
    pub use crate::zero::{prepare, Pseudocount};
}
