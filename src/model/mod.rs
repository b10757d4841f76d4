//! Statistical models for differential abundance analysis.

pub mod lm;

pub use lm::{fit_single_feature, model_lm, LmFailure, LmFit, LmFitSingle};
