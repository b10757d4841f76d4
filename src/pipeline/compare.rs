//! Agreement between the significant-feature sets of different methods.

use crate::config::MethodKind;
use crate::data::MethodResult;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Significant features of one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignificance {
    pub method: MethodKind,
    pub n_significant: usize,
    pub features: BTreeSet<String>,
}

/// Size of the intersection of two methods' significant sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    pub first: MethodKind,
    pub second: MethodKind,
    pub count: usize,
}

/// Overlap summary across the methods that produced results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodComparison {
    /// q-value threshold used for the test-based methods.
    pub alpha: f64,
    /// Per-method significant sets, in run order.
    pub methods: Vec<MethodSignificance>,
    /// Every pair of methods, in run order.
    pub pairwise: Vec<Overlap>,
    /// Present only when exactly three methods are compared.
    pub three_way: Option<usize>,
}

impl MethodComparison {
    /// Compare significant sets given directly.
    pub fn from_sets(sets: Vec<(MethodKind, BTreeSet<String>)>, alpha: f64) -> Self {
        let mut pairwise = Vec::new();
        for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                pairwise.push(Overlap {
                    first: sets[i].0,
                    second: sets[j].0,
                    count: sets[i].1.intersection(&sets[j].1).count(),
                });
            }
        }

        let three_way = match sets.as_slice() {
            [(_, a), (_, b), (_, c)] => Some(a.iter().filter(|f| b.contains(*f) && c.contains(*f)).count()),
            _ => None,
        };

        let methods = sets
            .into_iter()
            .map(|(method, features)| MethodSignificance {
                method,
                n_significant: features.len(),
                features,
            })
            .collect();

        Self {
            alpha,
            methods,
            pairwise,
            three_way,
        }
    }

    /// Compare method results using each method's significance rule.
    pub fn from_results(results: &[MethodResult], alpha: f64) -> Self {
        let sets = results
            .iter()
            .map(|r| (r.method, r.significant_features(alpha)))
            .collect();
        Self::from_sets(sets, alpha)
    }

    /// Overlap count between two methods, in either order.
    pub fn overlap(&self, a: MethodKind, b: MethodKind) -> Option<usize> {
        self.pairwise
            .iter()
            .find(|o| (o.first == a && o.second == b) || (o.first == b && o.second == a))
            .map(|o| o.count)
    }

    /// Human-readable summary, one fact per line.
    pub fn to_text(&self) -> String {
        let mut lines = vec!["Overlap between significant features:".to_string()];
        for m in &self.methods {
            lines.push(format!(
                "{} significant features: {}",
                m.method.name().to_uppercase(),
                m.n_significant
            ));
        }
        for o in &self.pairwise {
            lines.push(format!(
                "Overlap between {} and {}: {}",
                o.first.name().to_uppercase(),
                o.second.name().to_uppercase(),
                o.count
            ));
        }
        if let Some(n) = self.three_way {
            lines.push(format!("Overlap between all three methods: {}", n));
        }
        lines.join("\n")
    }

    /// Write the text summary.
    pub fn to_text_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_text() + "\n")?;
        Ok(())
    }

    /// Write the summary as pretty-printed JSON.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
