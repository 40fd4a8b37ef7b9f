//! CLI entry point for tsgen.
//!
//! Keeps a TypeScript API client in sync with a backend's OpenAPI schema:
//! source changes are debounced into regeneration cycles, and the client is
//! only regenerated when the schema's fingerprint changes.
//!
//! # Usage
//!
//! ```bash
//! tsgen [OPTIONS] <COMMAND>
//!
//! # Watch backend sources and regenerate on schema changes
//! tsgen --provider "cmd:python manage.py export_openapi_schema" --output-dir frontend/src/api watch
//!
//! # Regenerate once, even if the schema is unchanged
//! tsgen generate --force
//!
//! # Print the current schema fingerprint
//! tsgen fingerprint
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tsgen_core::{ClientFormat, Config, DEFAULT_CONFIG_FILE, FileStore, FingerprintStore};
use tsgen_regen::{
    CycleRunner, CycleSettings, GenerationOutcome, IdentifierResolver, OpenApiGeneratorCli,
    ProviderResolver, RegenerationController,
};
use tsgen_watcher::{FileWatcher, watch_filter};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Regenerates a TypeScript API client whenever the backend's OpenAPI schema
/// changes.
///
/// Options override values from the configuration file (`tsgen.json` in the
/// working directory, or `--config`).
#[derive(Parser)]
#[command(name = "tsgen", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "TSGEN_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Schema provider identifier (`file:<path>` or `cmd:<command>`).
    #[arg(short, long, global = true, env = "TSGEN_SCHEMA_PROVIDER")]
    provider: Option<String>,

    /// Directory the client is generated into.
    #[arg(short, long, global = true, env = "TSGEN_OUTPUT_DIR")]
    output_dir: Option<Utf8PathBuf>,

    /// Client format: fetch, axios or angular.
    #[arg(short, long, global = true, env = "TSGEN_FORMAT")]
    format: Option<ClientFormat>,

    /// Quiet period in seconds before changes trigger a cycle.
    #[arg(long, global = true, env = "TSGEN_DEBOUNCE")]
    debounce: Option<f64>,

    /// Keep previous files in the output directory when generating.
    #[arg(long, global = true, env = "TSGEN_NO_CLEAN")]
    no_clean: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch backend sources and regenerate the client when the schema changes.
    Watch,

    /// Run one regeneration cycle now.
    Generate {
        /// Regenerate even if the schema is unchanged.
        #[arg(long)]
        force: bool,
    },

    /// Print the fingerprint of the current schema.
    Fingerprint {
        /// Print the canonical JSON instead of its digest.
        #[arg(long)]
        canonical: bool,
    },

    /// Check configuration, stored state and external tools.
    Check,
}

/// The runner with the built-in collaborators.
type Runner = CycleRunner<IdentifierResolver, OpenApiGeneratorCli, FileStore>;

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// The `notify` crate is filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Returns the working directory as a UTF-8 path.
fn base_dir() -> color_eyre::Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|path| eyre!("Working directory is not valid UTF-8: {}", path.display()))
}

/// Loads the configuration file and applies command-line overrides.
///
/// Relative output and watch paths are resolved against `base_dir`.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
fn build_config(cli: &Cli, base_dir: &Utf8Path) -> color_eyre::Result<Config> {
    let mut config = Config::discover(cli.config.as_deref(), base_dir)?;
    apply_overrides(&mut config, cli);
    config.validate()?;

    let default_file = base_dir.join(DEFAULT_CONFIG_FILE);
    let config_file = match cli.config.as_deref() {
        Some(path) => Some(path),
        None => default_file.is_file().then_some(default_file.as_path()),
    };
    config.validate_paths(base_dir, config_file)?;

    config.output_dir = base_dir.join(&config.output_dir);
    config.watch.paths = config
        .watch
        .paths
        .iter()
        .map(|path| base_dir.join(path))
        .collect();

    Ok(config)
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(provider) = &cli.provider {
        config.schema_provider.clone_from(provider);
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output_dir.clone_from(output_dir);
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(debounce) = cli.debounce {
        config.debounce_seconds = debounce;
    }
    if cli.no_clean {
        config.clean_before_generate = false;
    }
}

/// Wires the built-in provider resolver, generator and store.
fn build_runner(config: &Config, base_dir: &Utf8Path) -> Runner {
    CycleRunner::new(
        IdentifierResolver::new(base_dir).with_command_timeout(config.generator_timeout()),
        OpenApiGeneratorCli::from_config(&config.generator, config.clean_before_generate),
        FileStore::in_output_dir(&config.output_dir),
        CycleSettings::from_config(config),
    )
}

/// Prints missing external tools; returns `true` if nothing is missing.
fn report_missing_dependencies(generator: &OpenApiGeneratorCli) -> bool {
    let missing = generator.missing_dependencies();
    if missing.is_empty() {
        return true;
    }

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "Missing tools required for client generation:");
    for dependency in &missing {
        let _ = writeln!(handle, "  {dependency}");
    }
    false
}

/// Resolves when Ctrl-C or (on Unix) SIGTERM is received.
async fn shutdown_signal() -> color_eyre::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Watches sources and drives the regeneration controller until shutdown.
///
/// # Errors
///
/// Returns an error if the stored fingerprint cannot be read at startup or
/// the watcher cannot be started.
async fn run_watch(config: Config, base_dir: &Utf8Path) -> color_eyre::Result<ExitCode> {
    info!(
        provider = %config.schema_provider,
        output_dir = %config.output_dir,
        format = %config.format,
        "Starting watch"
    );

    let runner = build_runner(&config, base_dir);
    runner.preflight()?;
    let mut tools_ready = report_missing_dependencies(runner.generator());
    if !tools_ready {
        warn!("Generation is skipped until the missing tools are installed");
    }

    let cancel = CancellationToken::new();
    let controller = RegenerationController::spawn(
        Arc::new(runner),
        config.debounce(),
        config.auto_generate,
        &cancel,
    );

    let mut outcomes = controller.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match outcomes.recv().await {
                Ok(outcome) => print_outcome(&outcome),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Status printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let filter = watch_filter(&config.watch, base_dir, &[config.output_dir.clone()])?;
    let mut watcher = FileWatcher::new(&config.watch, filter)?;
    info!(roots = ?watcher.roots(), "Watching for changes");

    if tools_ready {
        controller.on_triggering_event();
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutting down");
                break;
            }
            batch = watcher.recv() => {
                let Some(batch) = batch else {
                    warn!("File watcher stopped");
                    break;
                };
                debug!(files = batch.len(), "Source change detected");

                if !tools_ready {
                    tools_ready = controller.runner().generator().missing_dependencies().is_empty();
                    if !tools_ready {
                        debug!("Required tools still missing, ignoring change");
                        continue;
                    }
                    info!("Required tools found, resuming generation");
                }
                controller.on_triggering_event();
            }
        }
    }

    cancel.cancel();
    controller.shutdown().await;
    drop(controller);
    if let Err(e) = watcher.shutdown().await {
        warn!(error = %e, "Failed to stop file watcher cleanly");
    }
    let _ = printer.await;

    Ok(ExitCode::SUCCESS)
}

/// Runs one cycle immediately.
///
/// # Errors
///
/// Returns an error only for startup failures; a failed cycle yields a
/// non-zero exit code.
async fn run_generate(config: &Config, base_dir: &Utf8Path, force: bool) -> color_eyre::Result<ExitCode> {
    let runner = build_runner(config, base_dir);
    runner.preflight()?;
    if !report_missing_dependencies(runner.generator()) {
        return Ok(ExitCode::FAILURE);
    }

    let outcome = if force {
        runner.run_cycle_forced().await
    } else {
        runner.run_cycle().await
    };
    print_outcome(&outcome);

    Ok(if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Prints the fingerprint (or canonical JSON) of the current schema.
///
/// # Errors
///
/// Returns an error if the schema cannot be fetched, is invalid, or cannot
/// be canonicalized.
async fn run_fingerprint(config: &Config, base_dir: &Utf8Path, canonical: bool) -> color_eyre::Result<ExitCode> {
    let runner = build_runner(config, base_dir);
    let document = runner.fetch_schema().await?;
    document.validate()?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if canonical {
        writeln!(handle, "{}", tsgen_core::canonical_json(&document)?)?;
    } else {
        writeln!(handle, "{}", tsgen_core::fingerprint(&document)?)?;
    }

    Ok(ExitCode::SUCCESS)
}

/// Reports on everything a cycle depends on without running one.
fn run_check(config: &Config, base_dir: &Utf8Path) -> ExitCode {
    let runner = build_runner(config, base_dir);
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let mut healthy = true;

    let _ = writeln!(handle, "Configuration OK");
    let _ = writeln!(handle, "  provider:   {}", config.schema_provider);
    let _ = writeln!(handle, "  output dir: {}", config.output_dir);
    let _ = writeln!(
        handle,
        "  format:     {} ({})",
        config.format,
        config.format.generator_name()
    );

    match IdentifierResolver::new(base_dir).resolve(&config.schema_provider) {
        Ok(_) => {
            let _ = writeln!(handle, "Schema provider resolves");
        }
        Err(e) => {
            healthy = false;
            let _ = writeln!(handle, "Schema provider: {e}");
        }
    }

    match runner.store().load() {
        Ok(Some(fingerprint)) => {
            let _ = writeln!(handle, "Stored fingerprint: {fingerprint}");
        }
        Ok(None) => {
            let _ = writeln!(handle, "No stored fingerprint at {}", runner.store().location());
        }
        Err(e) => {
            healthy = false;
            let _ = writeln!(handle, "Fingerprint store: {e}");
        }
    }

    let missing = runner.generator().missing_dependencies();
    if missing.is_empty() {
        let _ = writeln!(handle, "External tools found");
    } else {
        healthy = false;
        for dependency in &missing {
            let _ = writeln!(handle, "{dependency}");
        }
    }

    if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Prints one status line per cycle.
fn print_outcome(outcome: &GenerationOutcome) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "[{}] {}", outcome.reason_code(), outcome.status_line());
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Load configuration
    let base_dir = base_dir()?;
    let config = build_config(&cli, &base_dir)?;

    // 5. Route to appropriate command
    match &cli.command {
        Commands::Watch => run_watch(config, &base_dir).await,
        Commands::Generate { force } => run_generate(&config, &base_dir, *force).await,
        Commands::Fingerprint { canonical } => run_fingerprint(&config, &base_dir, *canonical).await,
        Commands::Check => Ok(run_check(&config, &base_dir)),
    }
}
