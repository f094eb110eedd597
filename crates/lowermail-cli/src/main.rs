mod commands;
mod error;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use lowermail_core::FlushPolicy;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use crate::commands::{check, completions, migrate, Context};
use crate::error::{exit_code_for, report_error};
use lowermail_config as config;

#[derive(Debug, Parser)]
#[command(
    name = "lowermail",
    version,
    about = "Trim and lowercase the email field of every document in a Firestore collection"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Load variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Service-account JSON key to use instead of the environment
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,
    #[arg(long, global = true)]
    collection: Option<String>,
    #[arg(long, global = true)]
    page_size: Option<usize>,
    /// When to commit queued updates: after every page, or once at the end
    #[arg(long, global = true)]
    flush: Option<FlushPolicy>,
    /// Report what would change without writing
    #[arg(long, global = true)]
    dry_run: bool,
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the collection and normalize emails (default)
    Run,
    /// Validate configuration and credentials without contacting the database
    #[command(name = "check-config")]
    CheckConfig,
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_logging(verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, verbose);
            exit_code_for(&err)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        env_file,
        credentials,
        collection,
        page_size,
        flush,
        dry_run,
        json,
        verbose,
        command,
    } = cli;

    match command.unwrap_or(Command::Run) {
        Command::Completions(args) => completions::emit(args),
        command => {
            let loaded = config::load_env_file(env_file.as_deref())
                .with_context(|| "load env file")?;
            if let Some(path) = &loaded {
                debug!(path = %path.display(), "env file loaded");
            }

            let app_config = config::load(config_path.clone())
                .with_context(|| "load config")?
                .apply(config::Overrides {
                    collection,
                    page_size,
                    flush,
                    credentials_file: credentials,
                })
                .with_context(|| "apply command line options")?;
            if verbose {
                match config::resolve_config_path(config_path) {
                    Ok(path) => {
                        if path.exists() {
                            debug!(path = %path.display(), "config resolved");
                        } else {
                            debug!(path = %path.display(), "config missing, using defaults");
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "config unavailable");
                    }
                }
            }

            let connection = config::resolve_connection_from_env(&app_config)
                .with_context(|| "resolve credentials")?;

            let ctx = Context {
                config: &app_config,
                connection: &connection,
                json,
                dry_run,
            };

            match command {
                Command::Run => migrate::run(&ctx),
                Command::CheckConfig => check::check_config(&ctx),
                Command::Completions(_) => {
                    unreachable!("completions command handled before configuration")
                }
            }
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
