//! Data structures for differential abundance analysis.

mod abundance;
mod design_matrix;
mod metadata;
mod result;

pub use abundance::{AbundanceTable, UNMAPPED_FEATURE};
pub use design_matrix::{DesignMatrix, INTERCEPT};
pub use metadata::{Metadata, SampleIdSource, Variable, VariableType, SAMPLE_ID_CANDIDATES};
pub use result::{FeatureResult, FeatureStats, MethodResult};
