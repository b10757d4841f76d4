//! Sample selection shared by every method.

pub mod align;

pub use align::{align_tables, AlignedData, GroupAssignment};
