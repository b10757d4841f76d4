//! Sample alignment between the abundance table and the metadata.
//!
//! The aligner is method-agnostic: it intersects sample identifiers, applies
//! the optional group allow-list, and hands every method the same
//! (features × samples) matrix together with a parallel group-label vector.

use crate::data::{AbundanceTable, Metadata};
use crate::error::{DaError, Result};
use crate::logging::LogSink;
use std::collections::BTreeSet;

/// Group label of every aligned sample, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAssignment {
    /// One label per aligned sample.
    labels: Vec<String>,
    /// Distinct labels, sorted.
    levels: Vec<String>,
}

impl GroupAssignment {
    /// Build from per-sample labels.
    pub fn new(labels: Vec<String>) -> Self {
        let levels: BTreeSet<String> = labels.iter().cloned().collect();
        Self {
            labels,
            levels: levels.into_iter().collect(),
        }
    }

    /// Per-sample labels, parallel to the aligned sample columns.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Distinct group labels, sorted.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn n_groups(&self) -> usize {
        self.levels.len()
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Column indices of the samples in `level`.
    pub fn indices_of(&self, level: &str) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.as_str() == level)
            .map(|(j, _)| j)
            .collect()
    }

    /// Column indices per level, in level order.
    pub fn group_indices(&self) -> Vec<Vec<usize>> {
        self.levels.iter().map(|l| self.indices_of(l)).collect()
    }
}

/// Abundance and metadata restricted to the same samples, in the same order.
#[derive(Debug, Clone)]
pub struct AlignedData {
    pub abundance: AbundanceTable,
    pub metadata: Metadata,
    pub groups: GroupAssignment,
    /// Group column the assignment was derived from.
    pub group_col: String,
}

/// Intersect samples between `abundance` and `metadata` and assign groups.
///
/// Sample order follows the abundance table's columns. Samples without a group
/// value are dropped with a warning. With `filter_groups`, every requested
/// label must occur among the shared samples, and only samples in those
/// groups are kept.
///
/// # Errors
/// * `MissingColumn` - `group_col` is not a metadata column
/// * `EmptyIntersection` - no shared samples, before or after filtering
/// * `UnknownGroup` - a requested label does not occur in the data
pub fn align_tables(
    abundance: &AbundanceTable,
    metadata: &Metadata,
    group_col: &str,
    filter_groups: Option<&[String]>,
    sink: &dyn LogSink,
) -> Result<AlignedData> {
    if !metadata.has_column(group_col) {
        return Err(DaError::MissingColumn(group_col.to_string()));
    }
    let metadata = metadata.clone().with_categorical(group_col)?;

    let shared: Vec<String> = abundance
        .sample_ids()
        .iter()
        .filter(|sid| metadata.has_sample(sid))
        .cloned()
        .collect();
    if shared.is_empty() {
        return Err(DaError::EmptyIntersection(format!(
            "abundance table ({} samples) and metadata ({} samples) share no sample identifiers",
            abundance.n_samples(),
            metadata.n_samples()
        )));
    }

    let mut labelled: Vec<(String, String)> = Vec::with_capacity(shared.len());
    for sid in shared {
        match metadata.get(&sid, group_col).and_then(|v| v.as_label()) {
            Some(label) => labelled.push((sid, label)),
            None => sink.warn(&format!(
                "Sample '{}' has no value in '{}'; excluded",
                sid, group_col
            )),
        }
    }
    if labelled.is_empty() {
        return Err(DaError::EmptyIntersection(format!(
            "no shared sample has a value in group column '{}'",
            group_col
        )));
    }

    let available: BTreeSet<String> = labelled.iter().map(|(_, l)| l.clone()).collect();
    sink.info(&format!(
        "Data contains {} groups: {:?}",
        available.len(),
        available
    ));

    if let Some(requested) = filter_groups {
        let missing: Vec<String> = requested
            .iter()
            .filter(|g| !available.contains(g.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DaError::UnknownGroup {
                missing,
                available: available.into_iter().collect(),
            });
        }
        labelled.retain(|(_, label)| requested.iter().any(|g| g == label));
        if labelled.is_empty() {
            return Err(DaError::EmptyIntersection(format!(
                "no samples found for groups {:?}",
                requested
            )));
        }
        sink.info(&format!("Filtered to groups: {:?}", requested));
    }

    let (sample_ids, labels): (Vec<String>, Vec<String>) = labelled.into_iter().unzip();
    let aligned_abundance = abundance.select_samples(&sample_ids)?;
    let aligned_metadata = metadata.subset_samples(&sample_ids)?;
    let groups = GroupAssignment::new(labels);

    sink.info(&format!(
        "Aligned {} samples across {} groups",
        groups.n_samples(),
        groups.n_groups()
    ));

    Ok(AlignedData {
        abundance: aligned_abundance,
        metadata: aligned_metadata,
        groups,
        group_col: group_col.to_string(),
    })
}
