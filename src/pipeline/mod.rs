//! Running several methods over the same data and comparing their calls.

mod compare;
mod runner;

pub use compare::{MethodComparison, MethodSignificance, Overlap};
pub use runner::{
    run_analysis, run_from_files, AnalysisReport, MethodOutcome, Orchestrator,
    COMPARISON_JSON_FILE, COMPARISON_TEXT_FILE,
};
