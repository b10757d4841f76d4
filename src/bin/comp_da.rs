//! comp-da - compositional differential abundance CLI
//!
//! Runs the Monte-Carlo, pairwise log-ratio and bias-corrected regression
//! tests over an abundance table and writes one result table per method plus
//! a comparison of their significant features.

use clap::Parser;
use compositional_da::config::{AnalysisConfig, DenominatorMode, MethodKind};
use compositional_da::error::{DaError, Result};
use compositional_da::logging::LogFacade;
use compositional_da::pipeline::{run_from_files, MethodOutcome};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compositional differential abundance testing
#[derive(Parser, Debug)]
#[command(name = "comp-da")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Abundance table (TSV: feature ids in the first column, one column per sample)
    #[arg(short, long)]
    abundance_file: PathBuf,

    /// Sample metadata (CSV)
    #[arg(short, long)]
    metadata_file: PathBuf,

    /// Directory for result tables
    #[arg(short, long, default_value = "./DifferentialAbundance")]
    output_dir: PathBuf,

    /// YAML configuration; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Metadata column holding the group label
    #[arg(short, long)]
    group_col: Option<String>,

    /// Metadata column holding sample ids (auto-detected by default)
    #[arg(long)]
    sample_id_col: Option<String>,

    /// Methods to run (comma-separated: monte-carlo, pairwise-log-ratio, bias-corrected-regression)
    #[arg(long, value_delimiter = ',')]
    methods: Vec<String>,

    /// Drop the UNMAPPED feature before any computation
    #[arg(long)]
    exclude_unmapped: bool,

    /// Only analyze these groups (comma-separated)
    #[arg(long, value_delimiter = ',')]
    filter_groups: Vec<String>,

    /// Significance threshold
    #[arg(long)]
    alpha: Option<f64>,

    /// Number of Monte-Carlo draws
    #[arg(long)]
    mc_samples: Option<usize>,

    /// Random seed for the Monte-Carlo draws
    #[arg(long)]
    seed: Option<u64>,

    /// W ratio above which the pairwise test flags a feature
    #[arg(long)]
    ancom_cutoff: Option<f64>,

    /// Extra metadata columns for the regression model (comma-separated)
    #[arg(long, value_delimiter = ',')]
    covariates: Vec<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write log messages to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Start from the YAML file (or defaults) and apply every given flag.
    fn to_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_yaml(&std::fs::read_to_string(path)?)?,
            None => AnalysisConfig::default(),
        };

        if !self.methods.is_empty() {
            config.methods = self
                .methods
                .iter()
                .map(|m| MethodKind::from_str(m))
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(col) = &self.group_col {
            config.group_col = col.clone();
        }
        if let Some(col) = &self.sample_id_col {
            config.sample_id_col = Some(col.clone());
        }
        if self.exclude_unmapped {
            config.denom = DenominatorMode::UnmappedExcluded;
        }
        if !self.filter_groups.is_empty() {
            config.filter_groups = Some(self.filter_groups.clone());
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(n) = self.mc_samples {
            config.monte_carlo.mc_samples = n;
        }
        if self.seed.is_some() {
            config.monte_carlo.seed = self.seed;
        }
        if let Some(cutoff) = self.ancom_cutoff {
            config.pairwise.cutoff = cutoff;
        }
        if !self.covariates.is_empty() {
            config.covariates = self.covariates.clone();
        }

        config.build()
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = log::LevelFilter::from_str(level)
        .map_err(|_| DaError::InvalidParameter(format!("Unknown log level '{}'", level)))?;
    let mut builder = env_logger::Builder::new();
    builder.filter_level(filter).format_target(false);
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run(cli: &Cli) -> Result<bool> {
    init_logging(&cli.log_level, cli.log_file.as_deref())?;
    let config = cli.to_config()?;

    log::info!(
        "Methods: {}",
        config
            .methods
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let report = run_from_files(
        &cli.abundance_file,
        &cli.metadata_file,
        &config,
        &cli.output_dir,
        &LogFacade,
    )?;

    for outcome in &report.outcomes {
        if let MethodOutcome::Completed {
            method,
            path,
            n_features,
            n_significant,
        } = outcome
        {
            eprintln!(
                "{}: {} of {} features significant -> {}",
                method,
                n_significant,
                n_features,
                path.display()
            );
        }
    }

    let skipped = report.skipped();
    if !skipped.is_empty() {
        eprintln!("Warning: skipped methods:");
        for (method, reason) in &skipped {
            eprintln!("  {}: {}", method, reason);
        }
    }

    Ok(report.success())
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("Error: no method produced results");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
