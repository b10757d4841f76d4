//! Log-ratio transforms for compositional data.
//!
//! - **CLR**: per-sample centered log-ratio
//! - **Log-ratio**: log(x_i / x_j) between two features

pub mod clr;

pub use clr::{clr, log_ratio, log_transform, norm_clr, TransformedMatrix};
