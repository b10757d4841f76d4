//! Orchestration of the requested methods over one pair of input tables.

use super::compare::MethodComparison;
use crate::config::{AnalysisConfig, MethodKind};
use crate::data::{AbundanceTable, Metadata, MethodResult, SampleIdSource};
use crate::error::{DaError, Result};
use crate::filter::{align_tables, AlignedData};
use crate::logging::LogSink;
use crate::method::method_for;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the text comparison summary.
pub const COMPARISON_TEXT_FILE: &str = "method_comparison.txt";
/// Name of the JSON comparison summary.
pub const COMPARISON_JSON_FILE: &str = "method_comparison.json";

/// What happened to one requested method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodOutcome {
    /// The method ran and its table was written.
    Completed {
        method: MethodKind,
        path: PathBuf,
        n_features: usize,
        n_significant: usize,
    },
    /// The method did not produce a table.
    Skipped { method: MethodKind, reason: String },
}

impl MethodOutcome {
    pub fn method(&self) -> MethodKind {
        match self {
            Self::Completed { method, .. } | Self::Skipped { method, .. } => *method,
        }
    }
}

/// Summary of an orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// One outcome per requested method, in run order.
    pub outcomes: Vec<MethodOutcome>,
    /// Present when at least one method produced results.
    pub comparison: Option<MethodComparison>,
    pub output_dir: PathBuf,
}

impl AnalysisReport {
    /// At least one method produced a non-empty result.
    pub fn success(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, MethodOutcome::Completed { n_features, .. } if *n_features > 0))
    }

    /// Methods that were skipped, with the reason.
    pub fn skipped(&self) -> Vec<(MethodKind, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                MethodOutcome::Skipped { method, reason } => Some((*method, reason.as_str())),
                MethodOutcome::Completed { .. } => None,
            })
            .collect()
    }

    /// Outcome of a specific method.
    pub fn outcome(&self, method: MethodKind) -> Option<&MethodOutcome> {
        self.outcomes.iter().find(|o| o.method() == method)
    }
}

/// Runs every configured method and writes their tables.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: AnalysisConfig,
}

impl Orchestrator {
    /// Create an orchestrator; the configuration is validated up front.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Requested methods without repeats, in the configured order.
    fn methods(&self) -> Vec<MethodKind> {
        let mut seen = Vec::new();
        for &m in &self.config.methods {
            if !seen.contains(&m) {
                seen.push(m);
            }
        }
        seen
    }

    /// Input failures that must stop the run before alignment.
    fn precheck(&self, metadata: &Metadata) -> Result<()> {
        if self.methods().contains(&MethodKind::BiasCorrectedRegression) {
            if let Some(missing) = self
                .config
                .covariates
                .iter()
                .find(|c| !metadata.has_column(c))
            {
                return Err(DaError::MissingColumn(missing.clone()));
            }
        }
        Ok(())
    }

    /// A group filter that leaves the Monte-Carlo test, run alone, without
    /// exactly two groups stops the run. Checked after alignment so unknown
    /// labels are reported first.
    fn check_filtered_groups(&self, aligned: &AlignedData) -> Result<()> {
        let found = aligned.groups.n_groups();
        if self.config.filter_groups.is_some()
            && self.methods() == [MethodKind::MonteCarlo]
            && found != 2
        {
            return Err(DaError::InsufficientGroups {
                method: MethodKind::MonteCarlo.name().to_string(),
                required: "exactly 2".to_string(),
                found,
            });
        }
        Ok(())
    }

    /// Run the analysis and write results under `output_dir`.
    ///
    /// Alignment failures (`MissingColumn`, `EmptyIntersection`,
    /// `UnknownGroup`) abort the run. Any failure inside a single method only
    /// skips that method. Result tables are written as soon as their method
    /// completes.
    pub fn run<P: AsRef<Path>>(
        &self,
        abundance: &AbundanceTable,
        metadata: &Metadata,
        output_dir: P,
        sink: &dyn LogSink,
    ) -> Result<AnalysisReport> {
        let output_dir = output_dir.as_ref().to_path_buf();
        self.precheck(metadata)?;

        let aligned = align_tables(
            abundance,
            metadata,
            &self.config.group_col,
            self.config.filter_groups.as_deref(),
            sink,
        )?;
        self.check_filtered_groups(&aligned)?;

        std::fs::create_dir_all(&output_dir)?;

        let mut outcomes = Vec::new();
        let mut results: Vec<MethodResult> = Vec::new();

        for kind in self.methods() {
            sink.info(&format!("Running {} analysis", kind));
            let method = method_for(kind, &self.config);

            match method.run(&aligned, self.config.denom, sink) {
                Ok(result) if result.is_empty() => {
                    let reason = "no features could be tested".to_string();
                    sink.warn(&format!("Skipping {}: {}", kind, reason));
                    outcomes.push(MethodOutcome::Skipped { method: kind, reason });
                }
                Ok(result) => {
                    let dir = output_dir.join(kind.name());
                    std::fs::create_dir_all(&dir)?;
                    let path = dir.join(kind.result_file_name());
                    result.to_csv(&path)?;

                    let n_significant = result.significant_features(self.config.alpha).len();
                    sink.info(&format!(
                        "{}: {} significant of {} features; results saved to {}",
                        kind,
                        n_significant,
                        result.len(),
                        path.display()
                    ));
                    outcomes.push(MethodOutcome::Completed {
                        method: kind,
                        path,
                        n_features: result.len(),
                        n_significant,
                    });
                    results.push(result);
                }
                Err(e @ DaError::InsufficientGroups { .. }) => {
                    sink.warn(&format!("Skipping {}: {}", kind, e));
                    outcomes.push(MethodOutcome::Skipped {
                        method: kind,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    sink.error(&format!("{} failed: {}", kind, e));
                    outcomes.push(MethodOutcome::Skipped {
                        method: kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let comparison = if results.is_empty() {
            sink.warn("No method produced results; comparison not written");
            None
        } else {
            let comparison = MethodComparison::from_results(&results, self.config.alpha);
            for line in comparison.to_text().lines() {
                sink.info(line);
            }
            comparison.to_text_file(output_dir.join(COMPARISON_TEXT_FILE))?;
            comparison.to_json_file(output_dir.join(COMPARISON_JSON_FILE))?;
            Some(comparison)
        };

        Ok(AnalysisReport {
            outcomes,
            comparison,
            output_dir,
        })
    }
}

/// Run a configured analysis on in-memory tables.
pub fn run_analysis<P: AsRef<Path>>(
    abundance: &AbundanceTable,
    metadata: &Metadata,
    config: &AnalysisConfig,
    output_dir: P,
    sink: &dyn LogSink,
) -> Result<AnalysisReport> {
    Orchestrator::new(config.clone())?.run(abundance, metadata, output_dir, sink)
}

/// Load both tables from disk and run the analysis.
///
/// The abundance file is tab-separated; the metadata file comma-separated.
pub fn run_from_files<P: AsRef<Path>, Q: AsRef<Path>, R: AsRef<Path>>(
    abundance_path: P,
    metadata_path: Q,
    config: &AnalysisConfig,
    output_dir: R,
    sink: &dyn LogSink,
) -> Result<AnalysisReport> {
    let orchestrator = Orchestrator::new(config.clone())?;

    let abundance = AbundanceTable::from_tsv(&abundance_path)?;
    sink.info(&format!(
        "Loaded abundance table: {} features × {} samples",
        abundance.n_features(),
        abundance.n_samples()
    ));

    let metadata = Metadata::from_csv(&metadata_path, config.sample_id_col.as_deref())?;
    sink.info(&format!(
        "Loaded metadata: {} samples, sample ids from column '{}' ({:?})",
        metadata.n_samples(),
        metadata.sample_id_column(),
        metadata.id_source()
    ));
    if metadata.id_source() == SampleIdSource::FirstColumn {
        sink.warn(&format!(
            "No known sample-id column found; using first column '{}'",
            metadata.sample_id_column()
        ));
    }

    orchestrator.run(&abundance, &metadata, output_dir, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogCollector;
    use tempfile::tempdir;

    fn create_tables(groups: &[&str]) -> (AbundanceTable, Metadata) {
        let n = groups.len();
        let sample_ids: Vec<String> = (1..=n).map(|i| format!("S{}", i)).collect();
        let sid_refs: Vec<&str> = sample_ids.iter().map(|s| s.as_str()).collect();
        let rows: Vec<Vec<f64>> = vec![
            groups.iter().map(|g| if *g == "A" { 50.0 } else { 5.0 }).collect(),
            groups.iter().map(|g| if *g == "A" { 5.0 } else { 50.0 }).collect(),
            (0..n).map(|j| 20.0 + j as f64).collect(),
        ];
        let abundance = AbundanceTable::from_rows(&rows, &["f1", "f2", "f3"], &sid_refs).unwrap();

        let header = vec!["SampleID".to_string(), "Group".to_string()];
        let records = sample_ids
            .iter()
            .zip(groups.iter())
            .map(|(s, g)| vec![s.clone(), g.to_string()])
            .collect();
        let metadata = Metadata::from_records(header, records, None).unwrap();
        (abundance, metadata)
    }

    #[test]
    fn test_run_all_methods() {
        let dir = tempdir().unwrap();
        let (abundance, metadata) = create_tables(&["A", "A", "A", "B", "B", "B"]);
        let config = AnalysisConfig::new().mc_samples(8).seed(3).build().unwrap();

        let report = run_analysis(&abundance, &metadata, &config, dir.path(), &LogCollector::new())
            .unwrap();

        assert!(report.success());
        assert!(report.skipped().is_empty());
        for kind in MethodKind::ALL {
            let path = dir.path().join(kind.name()).join(kind.result_file_name());
            assert!(path.exists(), "missing {}", path.display());
        }
        assert!(dir.path().join(COMPARISON_TEXT_FILE).exists());
        assert!(dir.path().join(COMPARISON_JSON_FILE).exists());
        assert!(report.comparison.unwrap().three_way.is_some());
    }

    #[test]
    fn test_three_groups_skip_monte_carlo() {
        let dir = tempdir().unwrap();
        let (abundance, metadata) = create_tables(&["A", "A", "B", "B", "C", "C"]);
        let sink = LogCollector::new();

        let report =
            run_analysis(&abundance, &metadata, &AnalysisConfig::default(), dir.path(), &sink).unwrap();

        assert!(report.success());
        let skipped = report.skipped();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, MethodKind::MonteCarlo);
        assert!(!dir.path().join("monte-carlo").exists());
        assert!(sink.warnings().iter().any(|w| w.contains("monte-carlo")));
        assert_eq!(report.comparison.unwrap().three_way, None);
    }

    #[test]
    fn test_monte_carlo_only_precheck() {
        let dir = tempdir().unwrap();
        let (abundance, metadata) = create_tables(&["A", "A", "B", "B", "C", "C"]);
        let config = AnalysisConfig::new()
            .methods(&[MethodKind::MonteCarlo])
            .filter_groups(&["A", "B", "C"])
            .build()
            .unwrap();

        let err = run_analysis(&abundance, &metadata, &config, dir.path(), &LogCollector::new())
            .unwrap_err();
        assert!(matches!(err, DaError::InsufficientGroups { found: 3, .. }));

        let single = config.clone().filter_groups(&["A"]).build().unwrap();
        let err = run_analysis(&abundance, &metadata, &single, dir.path(), &LogCollector::new())
            .unwrap_err();
        assert!(matches!(err, DaError::InsufficientGroups { found: 1, .. }));
    }

    #[test]
    fn test_monte_carlo_only_unknown_group_reported_first() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let (abundance, metadata) = create_tables(&["A", "A", "B", "B"]);
        let config = AnalysisConfig::new()
            .methods(&[MethodKind::MonteCarlo])
            .filter_groups(&["Placebo"])
            .build()
            .unwrap();

        let err = run_analysis(&abundance, &metadata, &config, &out, &LogCollector::new())
            .unwrap_err();
        match err {
            DaError::UnknownGroup { missing, available } => {
                assert_eq!(missing, vec!["Placebo".to_string()]);
                assert_eq!(available, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("expected UnknownGroup, got {:?}", other),
        }
        assert!(!out.exists());
    }

    #[test]
    fn test_unknown_group_is_fatal() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let (abundance, metadata) = create_tables(&["A", "A", "B", "B"]);
        let config = AnalysisConfig::new().filter_groups(&["A", "Z"]).build().unwrap();

        let err = run_analysis(&abundance, &metadata, &config, &out, &LogCollector::new())
            .unwrap_err();
        assert!(matches!(err, DaError::UnknownGroup { .. }));
        // nothing computed, nothing written
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_covariate_is_fatal() {
        let dir = tempdir().unwrap();
        let (abundance, metadata) = create_tables(&["A", "A", "B", "B"]);
        let config = AnalysisConfig::new().covariates(&["Age"]).build().unwrap();

        let err = run_analysis(&abundance, &metadata, &config, dir.path(), &LogCollector::new())
            .unwrap_err();
        assert!(matches!(err, DaError::MissingColumn(c) if c == "Age"));
    }
}
