//! Tracked CLI - find a public server to join
//!
//! Usage:
//!   tracked scan <place-id> [--mode normal|deep|new|hunt|auto-blocker]
//!   tracked config path
//!   tracked config show
//!   tracked config init [--force]

mod console;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::ConsoleDelegate;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracked_core::AppConfig;
use tracked_scanner::{ProgressSink, ScanKind, ScanOrchestrator, ScanOutcome};

#[derive(Parser)]
#[command(name = "tracked")]
#[command(about = "Tracked - public server discovery and ranking", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a game's public servers and join or list the best ones
    Scan {
        /// Numeric place ID of the game
        place_id: String,

        /// Discovery strategy
        #[arg(short, long, value_enum, default_value_t = Mode::Normal)]
        mode: Mode,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Normal,
    Deep,
    New,
    Hunt,
    AutoBlocker,
}

impl From<Mode> for ScanKind {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Normal => ScanKind::Normal,
            Mode::Deep => ScanKind::Deep,
            Mode::New => ScanKind::NewServers,
            Mode::Hunt => ScanKind::Hunt,
            Mode::AutoBlocker => ScanKind::AutoBlocker,
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "info,tracked=debug"
    } else {
        "warn,tracked=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan { place_id, mode } => {
            let config = load_config(cli.config.as_deref())?;
            scan(config, mode.into(), &place_id).await
        }
        Commands::Config { action } => {
            let path = match cli.config {
                Some(path) => path,
                None => AppConfig::config_path()?,
            };
            config_command(&action, &path)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            config
        }
        None => AppConfig::load_with_env().context("Failed to load config")?,
    };
    Ok(config)
}

async fn scan(config: AppConfig, kind: ScanKind, place_id: &str) -> Result<ExitCode> {
    info!("Starting tracked v{}", env!("CARGO_PKG_VERSION"));

    let orchestrator = Arc::new(
        ScanOrchestrator::new(config, Arc::new(ConsoleDelegate))
            .context("Failed to create HTTP client")?,
    );

    let (progress, events) = ProgressSink::channel();
    let printer = tokio::spawn(console::print_progress(events));

    // First Ctrl-C ends a hunt (or cancels any other scan)
    let interrupt = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && !orchestrator.stop_hunt() {
                orchestrator.cancel();
            }
        })
    };

    let outcome = orchestrator.run(kind, place_id, progress).await;
    interrupt.abort();
    let _ = printer.await;

    let code = match outcome? {
        ScanOutcome::Found { .. } => ExitCode::SUCCESS,
        ScanOutcome::Cancelled => {
            println!("Scan cancelled");
            ExitCode::from(130)
        }
        ScanOutcome::Exhausted { .. } | ScanOutcome::RateLimited { .. } | ScanOutcome::Failed(_) => {
            ExitCode::FAILURE
        }
    };
    Ok(code)
}

fn config_command(action: &ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let config = load_config(Some(path))?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            AppConfig::default().save_to(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
