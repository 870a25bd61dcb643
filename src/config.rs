//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.stopwm.toml` files.

use crate::flags::{FlagCriteria, RangeRule};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".stopwm.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Preprocessing settings.
    #[serde(default)]
    pub preprocess: PreprocessConfig,

    /// Acceptable metric ranges by task.
    #[serde(default = "default_flags")]
    pub flags: FlagCriteria,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            preprocess: PreprocessConfig::default(),
            flags: default_flags(),
        }
    }
}

/// Data directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw export from the experiment server (`results_export/` lives here).
    #[serde(default = "default_raw_data_dir")]
    pub raw_data_dir: PathBuf,

    /// Per-subject/per-task CSV tree.
    #[serde(default = "default_preprocessed_data_dir")]
    pub preprocessed_data_dir: PathBuf,

    /// Output directory for metric tables.
    #[serde(default = "default_analysis_dir")]
    pub analysis_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data_dir: default_raw_data_dir(),
            preprocessed_data_dir: default_preprocessed_data_dir(),
            analysis_dir: default_analysis_dir(),
        }
    }
}

fn default_raw_data_dir() -> PathBuf {
    PathBuf::from("raw_data")
}

fn default_preprocessed_data_dir() -> PathBuf {
    PathBuf::from("data").join("preprocessed_data")
}

fn default_analysis_dir() -> PathBuf {
    PathBuf::from("data").join("analysis")
}

/// Preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Study collection whose sessions are converted.
    #[serde(default = "default_study_collection_id")]
    pub study_collection_id: i64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            study_collection_id: default_study_collection_id(),
        }
    }
}

fn default_study_collection_id() -> i64 {
    68 // stop+wm study collection
}

fn default_flags() -> FlagCriteria {
    FlagCriteria::new()
        .with_task("race_ethnicity_RMR_survey_rdoc")
        .with_rule("stop_signal", "stop_accuracy", RangeRule::between(0.25, 0.75))
        .with_rule("stop_signal", "go_accuracy", RangeRule::min(0.55))
        .with_rule("stop_signal", "go_mean_rt", RangeRule::max(850.0))
        .with_rule("stop_signal", "go_omission_rate", RangeRule::max(0.5))
}

/// Settings the orchestrator needs for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub preprocessed_data_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub flags: FlagCriteria,
    pub show_progress: bool,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.raw_dir {
            self.paths.raw_data_dir = dir.clone();
        }
        if let Some(ref dir) = args.preprocessed_dir {
            self.paths.preprocessed_data_dir = dir.clone();
        }
        if let Some(ref dir) = args.analysis_dir {
            self.paths.analysis_dir = dir.clone();
        }
        if let Some(crate::cli::Command::Preprocess {
            study_collection_id: Some(id),
        }) = args.command
        {
            self.preprocess.study_collection_id = id;
        }
    }

    /// Create the data directories if they don't exist yet.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.paths.raw_data_dir,
            &self.paths.preprocessed_data_dir,
            &self.paths.analysis_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Settings for an analysis run.
    pub fn analysis_settings(&self, show_progress: bool) -> AnalysisSettings {
        AnalysisSettings {
            preprocessed_data_dir: self.paths.preprocessed_data_dir.clone(),
            analysis_dir: self.paths.analysis_dir.clone(),
            flags: self.flags.clone(),
            show_progress,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
