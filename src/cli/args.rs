//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Kiln - package-recipe build orchestrator
///
/// Resolves a recipe's requirements, lays out a build directory keyed by the
/// settings, generates CMake inputs and drives the native build.
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .kiln.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a kiln.toml recipe
    Init(InitArgs),

    /// Resolve requirements and print the package graph
    Resolve(ResolveArgs),

    /// Resolve, plan the layout and write CMake inputs
    Generate(PipelineArgs),

    /// Generate, then run the CMake configure step
    Configure(PipelineArgs),

    /// Run the whole pipeline through the native build
    Build(PipelineArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Recipe name (defaults to the directory name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Recipe version
    #[arg(long, default_value = "0.1.0")]
    pub recipe_version: String,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Overwrite an existing kiln.toml without asking
    #[arg(short, long)]
    pub force: bool,

    /// Answer yes to prompts
    #[arg(short, long)]
    pub yes: bool,
}

/// Inputs shared by every pipeline command
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Directory containing kiln.toml
    #[arg(short, long, default_value = ".")]
    pub recipe: PathBuf,

    /// Workspace root for layouts and the package store
    #[arg(short, long, env = "KILN_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Setting override (repeatable), e.g. -s build_type=Debug
    #[arg(short = 's', long = "setting", value_parser = parse_setting)]
    pub settings: Vec<(String, String)>,

    /// Settings profile from config
    #[arg(long)]
    pub profile: Option<String>,

    /// Index source, directory or URL (repeatable; replaces configured sources)
    #[arg(long)]
    pub index: Vec<String>,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cmake.generator, profiles.release.build_type)
        key: String,
        /// Value to set
        value: String,
        /// Write to project-local .kiln.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Output format for resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Parse a setting override in AXIS=VALUE format
fn parse_setting(s: &str) -> Result<(String, String), String> {
    let (axis, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid AXIS=VALUE format: no '=' found in '{s}'"))?;
    let axis = axis.trim();
    if axis.is_empty() {
        return Err(format!("missing setting name in '{s}'"));
    }
    Ok((axis.to_string(), value.trim().to_string()))
}
