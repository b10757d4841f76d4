//! Analysis configuration.
//!
//! Every option the orchestrator understands lives in a typed field with a
//! documented default. Configurations are validated when they are built or
//! loaded, never at the point of use.

use crate::error::{DaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default significance threshold.
pub const DEFAULT_ALPHA: f64 = 0.05;
/// Default number of Monte-Carlo Dirichlet draws.
pub const DEFAULT_MC_SAMPLES: usize = 128;
/// Default W-ratio cutoff for the pairwise log-ratio test.
pub const DEFAULT_PAIRWISE_CUTOFF: f64 = 0.70;
/// Default metadata group column.
pub const DEFAULT_GROUP_COL: &str = "Group";

/// The differential abundance methods known to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodKind {
    /// Dirichlet Monte-Carlo CLR test (ALDEx2-like).
    #[serde(alias = "aldex2")]
    MonteCarlo,
    /// Pairwise log-ratio W statistic (ANCOM-like).
    #[serde(alias = "ancom")]
    PairwiseLogRatio,
    /// CLR regression with per-sample offset (ANCOM-BC-like).
    #[serde(alias = "ancom-bc")]
    BiasCorrectedRegression,
}

impl MethodKind {
    /// All methods in their canonical run order.
    pub const ALL: [MethodKind; 3] = [
        MethodKind::MonteCarlo,
        MethodKind::PairwiseLogRatio,
        MethodKind::BiasCorrectedRegression,
    ];

    /// Canonical kebab-case name, also used as the output directory.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MonteCarlo => "monte-carlo",
            Self::PairwiseLogRatio => "pairwise-log-ratio",
            Self::BiasCorrectedRegression => "bias-corrected-regression",
        }
    }

    /// File name of the persisted result table.
    pub fn result_file_name(&self) -> &'static str {
        match self {
            Self::MonteCarlo => "monte_carlo_results.csv",
            Self::PairwiseLogRatio => "pairwise_log_ratio_results.csv",
            Self::BiasCorrectedRegression => "bias_corrected_regression_results.csv",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MethodKind {
    type Err = DaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monte-carlo" | "monte_carlo" | "aldex2" => Ok(Self::MonteCarlo),
            "pairwise-log-ratio" | "pairwise_log_ratio" | "ancom" => Ok(Self::PairwiseLogRatio),
            "bias-corrected-regression" | "bias_corrected_regression" | "ancom-bc"
            | "ancom_bc" => Ok(Self::BiasCorrectedRegression),
            other => Err(DaError::UnknownMethod(other.to_string())),
        }
    }
}

/// Which features contribute to the denominator of log-ratio computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominatorMode {
    /// Keep every feature, including the unmapped sentinel.
    #[default]
    All,
    /// Drop the unmapped sentinel row before any computation.
    UnmappedExcluded,
}

impl FromStr for DenominatorMode {
    type Err = DaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "unmapped_excluded" | "unmapped-excluded" => Ok(Self::UnmappedExcluded),
            other => Err(DaError::InvalidParameter(format!(
                "Unknown denominator mode '{}' (expected 'all' or 'unmapped_excluded')",
                other
            ))),
        }
    }
}

/// Settings for the Monte-Carlo test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Number of Dirichlet draws per sample.
    pub mc_samples: usize,
    /// Random seed; `None` draws one from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            mc_samples: DEFAULT_MC_SAMPLES,
            seed: None,
        }
    }
}

/// Settings for the pairwise log-ratio test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwiseConfig {
    /// A feature is significant when its W ratio exceeds this value.
    pub cutoff: f64,
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_PAIRWISE_CUTOFF,
        }
    }
}

/// Full configuration for one orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Methods to run, in order.
    pub methods: Vec<MethodKind>,
    /// Metadata column holding the group label.
    pub group_col: String,
    /// Metadata column holding sample ids; auto-detected when `None`.
    pub sample_id_col: Option<String>,
    /// Treatment of the unmapped sentinel feature.
    pub denom: DenominatorMode,
    /// Restrict the analysis to these group labels.
    pub filter_groups: Option<Vec<String>>,
    /// Significance threshold for q-values and pairwise tests.
    pub alpha: f64,
    /// Extra metadata columns included in the regression model.
    pub covariates: Vec<String>,
    pub monte_carlo: MonteCarloConfig,
    pub pairwise: PairwiseConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            methods: MethodKind::ALL.to_vec(),
            group_col: DEFAULT_GROUP_COL.to_string(),
            sample_id_col: None,
            denom: DenominatorMode::All,
            filter_groups: None,
            alpha: DEFAULT_ALPHA,
            covariates: Vec::new(),
            monte_carlo: MonteCarloConfig::default(),
            pairwise: PairwiseConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DaError::from)
    }

    pub fn methods(mut self, methods: &[MethodKind]) -> Self {
        self.methods = methods.to_vec();
        self
    }

    pub fn group_col(mut self, column: &str) -> Self {
        self.group_col = column.to_string();
        self
    }

    pub fn sample_id_col(mut self, column: &str) -> Self {
        self.sample_id_col = Some(column.to_string());
        self
    }

    pub fn denom(mut self, denom: DenominatorMode) -> Self {
        self.denom = denom;
        self
    }

    pub fn filter_groups(mut self, groups: &[&str]) -> Self {
        self.filter_groups = Some(groups.iter().map(|g| g.to_string()).collect());
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn covariates(mut self, covariates: &[&str]) -> Self {
        self.covariates = covariates.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn mc_samples(mut self, n: usize) -> Self {
        self.monte_carlo.mc_samples = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.monte_carlo.seed = Some(seed);
        self
    }

    pub fn pairwise_cutoff(mut self, cutoff: f64) -> Self {
        self.pairwise.cutoff = cutoff;
        self
    }

    /// Validate and return the finished configuration.
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.methods.is_empty() {
            return Err(DaError::InvalidParameter(
                "At least one method must be selected".to_string(),
            ));
        }
        if self.group_col.trim().is_empty() {
            return Err(DaError::InvalidParameter(
                "Group column must not be empty".to_string(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(DaError::InvalidParameter(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.monte_carlo.mc_samples == 0 {
            return Err(DaError::InvalidParameter(
                "mc_samples must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.pairwise.cutoff) {
            return Err(DaError::InvalidParameter(format!(
                "Pairwise cutoff must be in [0, 1), got {}",
                self.pairwise.cutoff
            )));
        }
        if let Some(groups) = &self.filter_groups {
            if groups.is_empty() {
                return Err(DaError::InvalidParameter(
                    "filter_groups must name at least one group".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::new();
        assert_eq!(config.methods.len(), 3);
        assert_eq!(config.group_col, "Group");
        assert_eq!(config.alpha, 0.05);
        assert_eq!(config.monte_carlo.mc_samples, 128);
        assert_eq!(config.pairwise.cutoff, 0.70);
        assert_eq!(config.denom, DenominatorMode::All);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_method_names_and_aliases() {
        assert_eq!("aldex2".parse::<MethodKind>().unwrap(), MethodKind::MonteCarlo);
        assert_eq!("ANCOM".parse::<MethodKind>().unwrap(), MethodKind::PairwiseLogRatio);
        assert_eq!(
            "ancom-bc".parse::<MethodKind>().unwrap(),
            MethodKind::BiasCorrectedRegression
        );
        for kind in MethodKind::ALL {
            assert_eq!(kind.name().parse::<MethodKind>().unwrap(), kind);
        }
        assert!(matches!(
            "deseq2".parse::<MethodKind>(),
            Err(DaError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_denominator_parse() {
        assert_eq!("all".parse::<DenominatorMode>().unwrap(), DenominatorMode::All);
        assert_eq!(
            "unmapped_excluded".parse::<DenominatorMode>().unwrap(),
            DenominatorMode::UnmappedExcluded
        );
        assert!("none".parse::<DenominatorMode>().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(AnalysisConfig::new().alpha(0.0).build().is_err());
        assert!(AnalysisConfig::new().alpha(1.5).build().is_err());
        assert!(AnalysisConfig::new().mc_samples(0).build().is_err());
        assert!(AnalysisConfig::new().pairwise_cutoff(1.0).build().is_err());
        assert!(AnalysisConfig::new().methods(&[]).build().is_err());
        assert!(AnalysisConfig::new().group_col(" ").build().is_err());
    }

    #[test]
    fn test_yaml_roundtrip_with_aliases() {
        let yaml = r#"
methods: [aldex2, ancom]
group_col: Treatment
denom: unmapped_excluded
filter_groups: [Control, Drug]
alpha: 0.1
monte_carlo:
  mc_samples: 16
  seed: 7
"#;
        let config = AnalysisConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.methods,
            vec![MethodKind::MonteCarlo, MethodKind::PairwiseLogRatio]
        );
        assert_eq!(config.group_col, "Treatment");
        assert_eq!(config.denom, DenominatorMode::UnmappedExcluded);
        assert_eq!(config.monte_carlo.seed, Some(7));
        assert_eq!(config.pairwise.cutoff, 0.70);

        let again = AnalysisConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_yaml_rejects_invalid() {
        assert!(AnalysisConfig::from_yaml("alpha: 2.0").is_err());
    }
}
