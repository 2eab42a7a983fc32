//! Command line argument parsing for the coreir CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, Preset, SweepGrid};
use crate::error::Result;
use crate::retrieval::{DEFAULT_B, DEFAULT_K1, ScoringModel};

/// coreir - retrieval experiment pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "coreir")]
#[command(about = "Fetch a collection, index it, run BM25 topics and evaluate the run")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct CoreirArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl CoreirArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run every stage: fetch, index, search, evaluate
    Run(ConfigArgs),

    /// Download the collection if it is not present
    Fetch(ConfigArgs),

    /// Build the index unless it already exists
    Index(ConfigArgs),

    /// Search the topics and write the run file
    Search(ConfigArgs),

    /// Evaluate a run file with the evaluation script
    Evaluate(EvaluateArgs),

    /// Search the topics once per (k1, b) pair
    Sweep(SweepArgs),

    /// Print the effective configuration as JSON
    Config(ConfigArgs),
}

/// Where the configuration comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigSource {
    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in configuration
    #[arg(short, long, value_enum)]
    pub preset: Option<PresetName>,

    /// Directory relative paths are resolved against
    #[arg(long, value_name = "DIR", env = "COREIR_ROOT")]
    pub root: Option<PathBuf>,
}

impl ConfigSource {
    /// Load the configuration file or preset and apply `--root`.
    pub fn load(&self) -> Result<PipelineConfig> {
        let mut config = match (&self.config, self.preset) {
            (Some(path), _) => PipelineConfig::from_file(path)?,
            (None, Some(preset)) => Preset::from(preset).config(),
            (None, None) => Preset::default().config(),
        };
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        Ok(config)
    }
}

/// Configuration plus per-run overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub source: ConfigSource,

    /// BM25 term-frequency saturation
    #[arg(long)]
    pub k1: Option<f32>,

    /// BM25 length normalization
    #[arg(long)]
    pub b: Option<f32>,

    /// Maximum results per topic
    #[arg(long)]
    pub hits: Option<usize>,

    /// Search threads
    #[arg(long)]
    pub threads: Option<usize>,

    /// Rebuild the index even if it exists
    #[arg(long)]
    pub force_reindex: bool,

    /// Skip the evaluation stage
    #[arg(long)]
    pub no_eval: bool,
}

impl ConfigArgs {
    /// Load the configuration and apply the overrides.
    pub fn load(&self) -> Result<PipelineConfig> {
        let mut config = self.source.load()?;

        if self.k1.is_some() || self.b.is_some() {
            let (k1, b) = match config.retrieval.model {
                ScoringModel::Bm25 { k1, b } => (k1, b),
                ScoringModel::LibraryBm25 => (DEFAULT_K1, DEFAULT_B),
            };
            config.retrieval.model = ScoringModel::bm25(self.k1.unwrap_or(k1), self.b.unwrap_or(b));
        }
        if let Some(hits) = self.hits {
            config.retrieval.hits = hits;
        }
        if let Some(threads) = self.threads {
            config.retrieval.threads = Some(threads);
        }
        if self.force_reindex {
            config.indexing.force = true;
        }
        if self.no_eval {
            config.evaluation.enabled = false;
        }
        Ok(config)
    }
}

/// Arguments for evaluating a run
#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub source: ConfigSource,

    /// Run file to evaluate (default: the configured output)
    #[arg(long, value_name = "FILE")]
    pub run: Option<PathBuf>,
}

/// Arguments for a parameter sweep
#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub source: ConfigSource,

    /// k1 values, comma separated (default: the configured grid)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub k1: Vec<f32>,

    /// b values, comma separated (default: the configured grid)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub b: Vec<f32>,

    /// Maximum results per topic
    #[arg(long)]
    pub hits: Option<usize>,

    /// Do not evaluate the sweep runs
    #[arg(long)]
    pub no_eval: bool,
}

impl SweepArgs {
    /// Load the configuration and the grid to sweep.
    pub fn load(&self) -> Result<(PipelineConfig, SweepGrid)> {
        let mut config = self.source.load()?;
        if let Some(hits) = self.hits {
            config.retrieval.hits = hits;
        }

        let mut grid = config.sweep.clone();
        if !self.k1.is_empty() {
            grid.k1 = self.k1.clone();
        }
        if !self.b.is_empty() {
            grid.b = self.b.clone();
        }
        Ok((config, grid))
    }
}

/// Built-in configurations
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetName {
    /// Tuned BM25, MS MARCO run format, evaluated
    Leaderboard,
    /// Default BM25, TREC run format, not evaluated
    Baseline,
}

impl From<PresetName> for Preset {
    fn from(name: PresetName) -> Self {
        match name {
            PresetName::Leaderboard => Preset::Leaderboard,
            PresetName::Baseline => Preset::Baseline,
        }
    }
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RunFormat;

    #[test]
    fn test_run_command_with_overrides() {
        let args = CoreirArgs::try_parse_from([
            "coreir",
            "run",
            "--preset",
            "baseline",
            "--root",
            "/experiments",
            "--k1",
            "1.4",
            "--hits",
            "50",
            "--force-reindex",
            "--no-eval",
        ])
        .unwrap();

        if let Command::Run(run_args) = args.command {
            let config = run_args.load().unwrap();
            assert_eq!(config.root, PathBuf::from("/experiments"));
            assert_eq!(config.retrieval.model, ScoringModel::bm25(1.4, 0.4));
            assert_eq!(config.retrieval.hits, 50);
            assert_eq!(config.retrieval.output_format, RunFormat::Trec);
            assert!(config.indexing.force);
            assert!(!config.evaluation.enabled);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_default_preset_is_leaderboard() {
        let args = CoreirArgs::try_parse_from(["coreir", "search"]).unwrap();
        if let Command::Search(search_args) = args.command {
            let config = search_args.load().unwrap();
            assert_eq!(config.retrieval.model, ScoringModel::bm25(4.46, 0.82));
            assert_eq!(config.retrieval.hits, 100);
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_config_and_preset_conflict() {
        let result = CoreirArgs::try_parse_from([
            "coreir",
            "run",
            "--config",
            "coreir.json",
            "--preset",
            "baseline",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_grid_lists() {
        let args = CoreirArgs::try_parse_from([
            "coreir", "sweep", "--k1", "0.9,1.2", "--b", "0.4", "--no-eval",
        ])
        .unwrap();

        if let Command::Sweep(sweep_args) = args.command {
            let (_, grid) = sweep_args.load().unwrap();
            assert_eq!(grid.k1, vec![0.9, 1.2]);
            assert_eq!(grid.b, vec![0.4]);
            assert!(sweep_args.no_eval);
        } else {
            panic!("Expected Sweep command");
        }
    }

    #[test]
    fn test_sweep_defaults_to_configured_grid() {
        let args = CoreirArgs::try_parse_from(["coreir", "sweep"]).unwrap();
        if let Command::Sweep(sweep_args) = args.command {
            let (config, grid) = sweep_args.load().unwrap();
            assert_eq!(grid, config.sweep);
        } else {
            panic!("Expected Sweep command");
        }
    }

    #[test]
    fn test_evaluate_run_path() {
        let args =
            CoreirArgs::try_parse_from(["coreir", "evaluate", "--run", "runs/other.txt"]).unwrap();
        if let Command::Evaluate(eval_args) = args.command {
            assert_eq!(eval_args.run, Some(PathBuf::from("runs/other.txt")));
            let config = eval_args.source.load().unwrap();
            assert!(config.evaluation.enabled);
        } else {
            panic!("Expected Evaluate command");
        }
    }

    #[test]
    fn test_evaluate_rejects_stage_overrides() {
        for flag in ["--no-eval", "--force-reindex"] {
            let result = CoreirArgs::try_parse_from(["coreir", "evaluate", flag]);
            assert!(result.is_err(), "{flag} should be rejected");
        }
        let result = CoreirArgs::try_parse_from(["coreir", "evaluate", "--hits", "10"]);
        assert!(result.is_err());
        let result =
            CoreirArgs::try_parse_from(["coreir", "evaluate", "--preset", "baseline"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_verbosity_levels() {
        let args = CoreirArgs::try_parse_from(["coreir", "config"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = CoreirArgs::try_parse_from(["coreir", "-vv", "config"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = CoreirArgs::try_parse_from(["coreir", "config", "-vvv"]).unwrap();
        assert_eq!(args.verbosity(), 3);

        let args = CoreirArgs::try_parse_from(["coreir", "--quiet", "config"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            CoreirArgs::try_parse_from(["coreir", "--format", "json", "--pretty", "config"])
                .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(args.pretty);
    }
}
