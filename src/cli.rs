//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// stopwm - metrics and quality control for the stop-signal + working-memory battery
///
/// Converts the raw experiment export into per-subject/per-task CSV files,
/// computes per-task metrics for every subject, and flags subjects whose
/// metrics fall outside the configured ranges.
///
/// Examples:
///   stopwm
///   stopwm preprocess --study-collection-id 68
///   stopwm analyze --summary-json run.json
///   stopwm --preprocessed-dir ./data/preprocessed_data --analysis-dir ./out
///   stopwm --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Stage to run (defaults to analyze)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .stopwm.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the raw server export
    #[arg(long, value_name = "DIR", env = "STOPWM_RAW_DIR", global = true)]
    pub raw_dir: Option<PathBuf>,

    /// Directory holding the per-subject/per-task CSV tree
    #[arg(long, value_name = "DIR", env = "STOPWM_PREPROCESSED_DIR", global = true)]
    pub preprocessed_dir: Option<PathBuf>,

    /// Directory the metric tables are written to
    #[arg(long, value_name = "DIR", env = "STOPWM_ANALYSIS_DIR", global = true)]
    pub analysis_dir: Option<PathBuf>,

    /// Write the run summary as JSON to this file (analyze only)
    #[arg(long, value_name = "FILE", global = true)]
    pub summary_json: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bar)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .stopwm.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Pipeline stage.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Compute per-task metrics and flag out-of-range subjects
    Analyze,
    /// Convert the raw server export into per-subject/per-task CSV files
    Preprocess {
        /// Study collection to convert (overrides the config file)
        #[arg(long, value_name = "ID")]
        study_collection_id: Option<i64>,
    },
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The stage to run.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Analyze)
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(Command::Preprocess {
            study_collection_id: Some(id),
        }) = self.command
        {
            if id <= 0 {
                return Err("Study collection ID must be positive".to_string());
            }
        }

        if self.summary_json.is_some() && self.command() != Command::Analyze {
            return Err("--summary-json is only available for analyze".to_string());
        }

        // Validate config path if provided
        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            command: None,
            config: None,
            raw_dir: None,
            preprocessed_dir: None,
            analysis_dir: None,
            summary_json: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_default_command_is_analyze() {
        let args = make_args();
        assert_eq!(args.command(), Command::Analyze);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_preprocess_subcommand() {
        let args = Args::try_parse_from(["stopwm", "preprocess", "--study-collection-id", "70"])
            .unwrap();
        assert_eq!(
            args.command(),
            Command::Preprocess {
                study_collection_id: Some(70)
            }
        );
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_summary_json_requires_analyze() {
        let mut args = make_args();
        args.summary_json = Some(PathBuf::from("run.json"));
        assert!(args.validate().is_ok());

        args.command = Some(Command::Preprocess {
            study_collection_id: None,
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_config_file() {
        let mut args = make_args();
        args.config = Some(PathBuf::from("/nonexistent/.stopwm.toml"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
