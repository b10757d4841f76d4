//! Statistical hypothesis testing for differential abundance.


pub use anova::one_way_anova;
pub use wald::{test_wald, wald_single, WaldResult, WaldResultSingle};
pub use welch::{welch_t_test, TestOutcome};

/// Relative size below which a spread or difference counts as zero.
pub(crate) const EXACT_FIT_TOLERANCE: f64 = 1e-10;

/// Absolute zero threshold for quantities on the scale of `values`.
pub(crate) fn exact_tolerance<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> f64 {
    let scale = values.into_iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    EXACT_FIT_TOLERANCE * (1.0 + scale)
}

/// Test for a group effect: Welch's t-test for two groups, one-way ANOVA
/// for three or more.
pub fn group_difference(groups: &[Vec<f64>]) -> TestOutcome {
    match groups {
        [x, y] => welch_t_test(x, y),
        _ => one_way_anova(groups),
    }
}
