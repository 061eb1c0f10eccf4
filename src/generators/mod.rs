//! Build-system input generation
//!
//! Each [`Generator`] turns the resolved graph, the settings and the layout
//! plan into files under the generators directory. Generators are
//! independent of each other, so [`generate_all`] runs them concurrently and
//! returns only once every one has finished.
//!
//! Output is a pure function of the inputs: no timestamps, sorted iteration,
//! and every file is rewritten on each run through [`write_atomic`].

pub mod deps;
pub mod toolchain;

pub use deps::DepsGenerator;
pub use toolchain::{ToolchainGenerator, ToolchainOptions, TOOLCHAIN_FILE};

use crate::error::{GenerateError, KilnResult};
use crate::layout::{write_atomic, Layout, LayoutPlan};
use crate::resolver::ResolvedGraph;
use crate::settings::Settings;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One file written by a generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub generator: &'static str,
    pub path: PathBuf,
}

/// Inputs shared by all generators
pub struct GenerateContext<'a> {
    pub graph: &'a ResolvedGraph,
    pub settings: &'a Settings,
    pub plan: &'a LayoutPlan,
    /// Planner used to locate installed dependency packages
    pub layout: &'a Layout,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, ctx: &GenerateContext<'_>) -> Result<Vec<GeneratedArtifact>, GenerateError>;
}

/// Run every generator concurrently.
///
/// Artifacts are returned in generator order. If any generator fails the
/// first failure (in generator order) is returned, after all have finished.
pub async fn generate_all(
    generators: &[Box<dyn Generator>],
    ctx: &GenerateContext<'_>,
) -> KilnResult<Vec<GeneratedArtifact>> {
    let results = join_all(generators.iter().map(|g| g.generate(ctx))).await;

    let mut artifacts = Vec::new();
    for (generator, result) in generators.iter().zip(results) {
        let written = result?;
        debug!("{} generator wrote {} files", generator.name(), written.len());
        artifacts.extend(written);
    }

    info!(
        "Generated {} files in {}",
        artifacts.len(),
        ctx.plan.generators_dir.display()
    );
    Ok(artifacts)
}

/// The standard generator set: dependency descriptors and toolchain file
pub fn default_generators(toolchain: ToolchainOptions) -> Vec<Box<dyn Generator>> {
    vec![
        Box::new(DepsGenerator),
        Box::new(ToolchainGenerator::new(toolchain)),
    ]
}

/// Atomically write one artifact
pub(crate) async fn write_artifact(
    generator: &'static str,
    path: PathBuf,
    content: &str,
) -> Result<GeneratedArtifact, GenerateError> {
    write_atomic(&path, content.as_bytes())
        .await
        .map_err(|source| GenerateError::WriteFailure {
            path: path.clone(),
            source,
        })?;
    Ok(GeneratedArtifact { generator, path })
}

/// Quote a value for a CMake string argument
pub(crate) fn cmake_quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("\"{}\"", escaped)
}

/// Path in CMake's forward-slash form
pub(crate) fn cmake_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
