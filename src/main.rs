//! Kiln - package-recipe build orchestrator
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use kiln::cancel::CancelToken;
use kiln::cli::{Cli, Commands};
use kiln::config::{Config, ConfigManager};
use kiln::error::{KilnError, KilnResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> KilnResult<()> {
    let cli = Cli::parse();

    // Init and completions don't need config loading
    match cli.command {
        Commands::Init(args) => {
            init_logging(cli.verbose, None);
            kiln::ui::init_theme();
            return kiln::cli::commands::init(args).await;
        }
        Commands::Completions { shell } => {
            kiln::cli::commands::completions(shell);
            return Ok(());
        }
        _ => {}
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir().map_err(|e| KilnError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager.load_merged(local_config_path.as_deref()).await?;
    init_logging(cli.verbose, Some(&config));
    kiln::ui::init_theme();
    match local_config_path {
        Some(ref path) => debug!("Using local config: {}", path.display()),
        None if cli.no_local => debug!("Local config discovery disabled (--no-local)"),
        None => {}
    }

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();

    // Dispatch to command
    match cli.command {
        Commands::Init(_) | Commands::Completions { .. } => Ok(()),
        Commands::Resolve(args) => kiln::cli::commands::resolve(args, &config, cancel).await,
        Commands::Generate(args) => kiln::cli::commands::generate(args, &config, cancel).await,
        Commands::Configure(args) => kiln::cli::commands::configure(args, &config, cancel).await,
        Commands::Build(args) => kiln::cli::commands::build(args, &config, cancel).await,
        Commands::Config(args) => kiln::cli::commands::config(args, &config_manager, &config).await,
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug; JSON lines when configured
fn init_logging(verbose: u8, config: Option<&Config>) {
    let filter = match verbose {
        0 => EnvFilter::new("kiln=warn"),
        1 => EnvFilter::new("kiln=info"),
        _ => EnvFilter::new("kiln=debug"),
    };

    let json = config.is_some_and(|c| c.general.log_format == "json");
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
