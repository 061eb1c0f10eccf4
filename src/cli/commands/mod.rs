//! CLI command implementations

pub mod completions;
pub mod config;
pub mod init;
mod observer;
pub mod pipeline;
pub mod resolve;

pub use completions::execute as completions;
pub use config::execute as config;
pub use init::execute as init;
pub use resolve::execute as resolve;

use crate::cancel::CancelToken;
use crate::cli::args::PipelineArgs;
use crate::config::Config;
use crate::error::KilnResult;
use crate::pipeline::{Phase, Pipeline, PipelineOptions};

/// Resolve, plan and write CMake inputs
pub async fn generate(args: PipelineArgs, config: &Config, cancel: CancelToken) -> KilnResult<()> {
    pipeline::execute(args, config, cancel, Phase::Generate).await
}

/// Generate, then configure
pub async fn configure(args: PipelineArgs, config: &Config, cancel: CancelToken) -> KilnResult<()> {
    pipeline::execute(args, config, cancel, Phase::Configure).await
}

/// Full pipeline
pub async fn build(args: PipelineArgs, config: &Config, cancel: CancelToken) -> KilnResult<()> {
    pipeline::execute(args, config, cancel, Phase::Build).await
}

impl From<PipelineArgs> for PipelineOptions {
    fn from(args: PipelineArgs) -> Self {
        Self {
            recipe_dir: args.recipe,
            workspace: args.workspace,
            profile: args.profile,
            settings: args.settings,
            index: args.index,
        }
    }
}

/// Validate phase shared by every pipeline command
async fn prepare(args: PipelineArgs, config: &Config, cancel: CancelToken) -> KilnResult<Pipeline> {
    let options = PipelineOptions::from(args);
    Ok(Pipeline::prepare(config, &options).await?.with_cancel(cancel))
}
