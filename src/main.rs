//! stopwm - metrics and quality control for the stop-signal + working-memory battery
//!
//! A batch CLI with two stages:
//!   preprocess - convert the raw server export into per-subject/per-task CSVs
//!   analyze    - compute per-task metrics and flag out-of-range subjects
//!
//! Exit codes:
//!   0 - Run completed (skipped or failed subject/task units are only logged)
//!   1 - Setup or output error (bad config, unreadable input root, unwritable output)

mod analysis;
mod cli;
mod config;
mod error;
mod flags;
mod literal;
mod models;
mod orchestrator;
mod preprocess;
mod report;
mod scanner;
mod table;

use anyhow::{Context, Result};
use cli::{Args, Command};
use config::Config;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize logging
    init_logging(&args);

    info!("stopwm v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(&args) {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Handle --init-config: generate a default .stopwm.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize data paths and flag ranges.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` takes
/// precedence when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the selected stage.
fn run(args: &Args) -> Result<()> {
    let mut config = load_config(args)?;
    config.merge_with_args(args);
    config.ensure_directories()?;

    match args.command() {
        Command::Analyze => run_analyze(args, &config),
        Command::Preprocess { .. } => run_preprocess(args, &config),
    }
}

fn run_analyze(args: &Args, config: &Config) -> Result<()> {
    let settings = config.analysis_settings(!args.quiet);
    let summary = orchestrator::run_analysis(&settings)?;

    if let Some(ref path) = args.summary_json {
        report::write_json_summary(&summary, path)?;
        info!("Run summary written to {}", path.display());
    }

    if !args.quiet {
        println!("\n📊 Analysis Summary:");
        for line in report::generate_summary_text(&summary).lines() {
            println!("   {}", line);
        }
        println!("   Duration: {:.1}s", summary.duration_seconds);
        if summary.outputs.is_empty() {
            println!("\n⚠️  No metrics collected.");
        } else {
            println!(
                "\n✅ Analysis complete! Tables saved to: {}",
                settings.analysis_dir.display()
            );
        }
    }

    Ok(())
}

fn run_preprocess(args: &Args, config: &Config) -> Result<()> {
    let summary = preprocess::run_preprocess(
        &config.paths.raw_data_dir,
        &config.paths.preprocessed_data_dir,
        config.preprocess.study_collection_id,
    )?;

    if !args.quiet {
        println!("\n📦 Preprocessing Summary:");
        println!("   Sessions: {}", summary.sessions);
        println!("   Written: {}", summary.written);
        println!("   Empty: {}", summary.empty);
        println!("   Failed: {}", summary.failed);
        println!(
            "\n✅ Preprocessing complete! CSVs saved under: {}",
            config.paths.preprocessed_data_dir.display()
        );
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
