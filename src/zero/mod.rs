//! Zero handling before log-based transforms.

pub mod pseudocount;

pub use pseudocount::{
    half_min_pseudocount, prepare, replace_zeros, Pseudocount, ZeroHandled, LOG_RATIO_PSEUDOCOUNT,
};
