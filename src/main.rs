//! DocDown - Markdown to Word conversion with citations via Pandoc
//!
//! Command line entry point. It stands in for the tray application's file
//! handoff: files passed to `convert` are what a drag-and-drop or "open with"
//! would deliver.
//!
//! # Execution Flow
//!
//! 1. Load application configuration (embedded defaults, `docdown.yaml`, `DOCDOWN__*`)
//! 2. Initialize logging → `<log_dir>/docdown.<date>`
//! 3. Open the preferences store and seed first-run defaults
//! 4. Create tokio runtime with 4 worker threads
//! 5. Run the requested command
//! 6. Log the conversion summary
//!
//! # Commands
//!
//! - `docdown convert <FILES>...`: convert files, concurrently
//! - `docdown again`: convert the last converted file again
//! - `docdown set <KEY> <VALUE>`: write a user preference
//! - `docdown show`: print the effective preferences

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use docdown::config::{
    self, ConfigurationResolver, SettingsStore, YamlSettingsStore, default_preferences,
    set_preference,
};
use docdown::models::{SettingValue, keys};
use docdown::services::{
    CommandBuilder, ConsoleNotifier, ConversionService, EngineLocator, TokioEngineRunner,
};
use docdown::{APP_NAME, AppConfig, ConversionMetrics, ConversionOutcome, VERSION};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "docdown", version, about = "Convert Markdown to Word with citations via Pandoc")]
struct Cli {
    /// Application configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert Markdown files
    Convert {
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,
    },
    /// Convert the last converted file again
    Again,
    /// Set a user preference, e.g. `set bibliographyFile ~/library.bib`
    Set { key: String, value: String },
    /// Show the effective preferences
    Show,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let app_config = config::load_app_config(cli.config.as_deref(), cli.debug)?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = docdown::logging::setup_logging_from_config(&app_config)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let settings_path = config::settings_path(&app_config)?;
    let store = Arc::new(
        YamlSettingsStore::open(&settings_path)
            .with_context(|| format!("Failed to open preferences at {}", settings_path))?,
    );

    let home = config::home_dir()?;
    let first_run = store
        .seed_defaults(default_preferences(&app_config, &home))
        .context("Failed to seed default preferences")?;
    if first_run {
        println!(
            "Welcome to DocDown! Set your bibliography with `docdown set {} <file>`.",
            keys::BIBLIOGRAPHY_FILE
        );
    }

    match cli.command {
        Command::Set { key, value } => {
            if !keys::ALL.contains(&key.as_str()) {
                eprintln!("Warning: {} is not a preference DocDown reads", key);
            }
            set_preference(store.as_ref(), &key, SettingValue::parse(&value))
                .with_context(|| format!("Failed to set {}", key))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Show => {
            show_preferences(&ConfigurationResolver::new(store));
            Ok(ExitCode::SUCCESS)
        }
        Command::Convert { files } => run_conversions(&app_config, store, Some(files)),
        Command::Again => run_conversions(&app_config, store, None),
    }
}

fn show_preferences(resolver: &ConfigurationResolver) {
    for name in keys::ALL {
        let value = resolver
            .lookup(name)
            .map(|value| value.to_string())
            .unwrap_or_default();
        println!("{:<32} {}", name, value);
    }
}

/// Convert `files`, or the last converted file when `files` is `None`.
fn run_conversions(
    app_config: &AppConfig,
    store: Arc<YamlSettingsStore>,
    files: Option<Vec<Utf8PathBuf>>,
) -> Result<ExitCode> {
    // Create tokio runtime for subprocess execution
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("docdown-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let metrics = Arc::new(ConversionMetrics::new());
    let store: Arc<dyn SettingsStore> = store;

    let service = Arc::new(
        ConversionService::new(
            ConfigurationResolver::new(store),
            EngineLocator::new(
                app_config.bundled_engine_path(),
                app_config.engine.binary_name.clone(),
            )
            .with_extra_search_dirs(app_config.engine.extra_search_dirs.clone()),
            CommandBuilder::new(app_config.live_citation_filter_path()),
            TokioEngineRunner::new(app_config.engine.timeout()),
            Arc::new(ConsoleNotifier::new(true)),
        )
        .with_metrics(metrics.clone()),
    );

    let outcomes: Vec<ConversionOutcome> = match files {
        Some(files) => {
            let files = absolute(files)?;
            runtime.block_on(service.convert_files(files))
        }
        None => runtime
            .block_on(service.convert_last_file())
            .into_iter()
            .collect(),
    };

    if outcomes.is_empty() {
        println!("Nothing to convert again yet.");
    }

    metrics.log_summary();

    if outcomes.iter().all(|outcome| outcome.is_success()) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Relative paths are resolved against the working directory.
fn absolute(files: Vec<Utf8PathBuf>) -> Result<Vec<Utf8PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|path| anyhow::anyhow!("Working directory is not UTF-8: {}", path.display()))?;

    Ok(files
        .into_iter()
        .map(|file| if file.is_absolute() { file } else { cwd.join(file) })
        .collect())
}
