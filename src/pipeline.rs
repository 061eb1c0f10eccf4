//! Orchestration of one invocation
//!
//! Phases run strictly in order: validate, resolve, plan, generate,
//! configure, build. A failure in any phase stops the run, and the cancel
//! token is checked before each phase starts.

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::driver::{BuildBackend, BuildRecord, CMakeBackend, StepOutcome};
use crate::error::KilnResult;
use crate::generators::{self, GenerateContext, GeneratedArtifact, ToolchainOptions};
use crate::index::IndexSet;
use crate::layout::{Layout, LayoutPlan};
use crate::recipe::Recipe;
use crate::resolver::{self, ResolvedGraph};
use crate::settings::Settings;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Pipeline phases in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Validate,
    Resolve,
    Plan,
    Generate,
    Configure,
    Build,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Resolve => "resolve",
            Self::Plan => "plan",
            Self::Generate => "generate",
            Self::Configure => "configure",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives progress from a running pipeline
pub trait PhaseObserver: Send + Sync {
    fn phase_started(&self, _phase: Phase) {}

    fn phase_finished(&self, _phase: Phase, _detail: &str) {}

    /// One line of configure/build tool output
    fn output_line(&self, _line: String) {}
}

/// Observer that ignores everything
pub struct Silent;

impl PhaseObserver for Silent {}

/// What a run produced, up to the last phase it reached
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub graph: Option<ResolvedGraph>,
    pub plan: Option<LayoutPlan>,
    pub artifacts: Vec<GeneratedArtifact>,
    pub configure: Option<StepOutcome>,
    pub build: Option<StepOutcome>,
}

/// Invocation inputs gathered from the command line
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Directory containing `kiln.toml`
    pub recipe_dir: PathBuf,
    /// Overrides the configured workspace root
    pub workspace: Option<PathBuf>,
    /// Settings profile name
    pub profile: Option<String>,
    /// `axis=value` overrides, applied over the profile
    pub settings: Vec<(String, String)>,
    /// Index sources used instead of the configured ones
    pub index: Vec<String>,
}

/// Merge profile values with explicit overrides (overrides win)
pub fn settings_values(
    config: &Config,
    profile: Option<&str>,
    overrides: &[(String, String)],
) -> KilnResult<BTreeMap<String, String>> {
    let profile = profile.or(config.general.default_profile.as_deref());
    let mut values = match profile {
        Some(name) => {
            debug!("Using settings profile {}", name);
            config.profile(name)?.clone()
        }
        None => BTreeMap::new(),
    };
    for (axis, value) in overrides {
        values.insert(axis.clone(), value.clone());
    }
    Ok(values)
}

/// A validated invocation, ready to run
pub struct Pipeline {
    recipe: Recipe,
    settings: Settings,
    index: IndexSet,
    layout: Layout,
    backend: Arc<dyn BuildBackend>,
    toolchain: ToolchainOptions,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(recipe: Recipe, settings: Settings, index: IndexSet, layout: Layout) -> Self {
        Self {
            recipe,
            settings,
            index,
            layout,
            backend: Arc::new(CMakeBackend::default()),
            toolchain: ToolchainOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn BuildBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_toolchain(mut self, toolchain: ToolchainOptions) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Validate phase: load the recipe and settings from options and config
    pub async fn prepare(config: &Config, options: &PipelineOptions) -> KilnResult<Self> {
        let recipe = Recipe::from_dir(&options.recipe_dir).await?;
        let raw = settings_values(config, options.profile.as_deref(), &options.settings)?;
        let settings = Settings::validate(&recipe, &raw)?;
        debug!("Settings for {}: {}", recipe.identity, settings);

        let sources = if options.index.is_empty() {
            &config.index.sources
        } else {
            &options.index
        };
        let index = IndexSet::from_specs(sources);

        let explicit = options.workspace.clone().or_else(|| config.workspace.root.clone());
        let create_parents = explicit.is_none();
        let workspace = explicit.unwrap_or_else(|| config.workspace_root());
        let backend = CMakeBackend::new(config.cmake.program.clone())
            .with_generator(config.cmake.generator.clone())
            .with_jobs(config.cmake.jobs);
        let toolchain = settings
            .compiler
            .map(|compiler| {
                let paths = config.compiler_paths(compiler.as_str());
                ToolchainOptions {
                    cc: paths.cc,
                    cxx: paths.cxx,
                }
            })
            .unwrap_or_default();

        Ok(Self::new(recipe, settings, index, Layout::new(workspace).with_create_parents(create_parents))
            .with_backend(Arc::new(backend))
            .with_toolchain(toolchain))
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn workspace(&self) -> &Path {
        self.layout.workspace()
    }

    pub async fn resolve(&self) -> KilnResult<ResolvedGraph> {
        self.cancel.check()?;
        resolver::resolve(&self.recipe, &self.settings, &self.index).await
    }

    pub async fn plan(&self) -> KilnResult<LayoutPlan> {
        self.cancel.check()?;
        self.layout.plan(&self.recipe, &self.settings).await
    }

    /// Run all generators; returns once every one has finished
    pub async fn generate(&self, graph: &ResolvedGraph, plan: &LayoutPlan) -> KilnResult<Vec<GeneratedArtifact>> {
        self.cancel.check()?;
        let ctx = GenerateContext {
            graph,
            settings: &self.settings,
            plan,
            layout: &self.layout,
        };
        generators::generate_all(&generators::default_generators(self.toolchain.clone()), &ctx).await
    }

    pub async fn configure(
        &self,
        plan: &LayoutPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<StepOutcome> {
        self.cancel.check()?;
        self.backend.configure(plan, on_output, &self.cancel).await
    }

    pub async fn build(
        &self,
        plan: &LayoutPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<StepOutcome> {
        self.cancel.check()?;
        self.backend.build(plan, on_output, &self.cancel).await
    }

    /// Run every phase from resolve through `last`
    pub async fn run_until(&self, last: Phase, observer: &dyn PhaseObserver) -> KilnResult<PipelineReport> {
        let mut report = PipelineReport::default();
        let on_output = |line: String| observer.output_line(line);

        observer.phase_started(Phase::Resolve);
        let graph = self.resolve().await?;
        observer.phase_finished(Phase::Resolve, &format!("{} packages", graph.len()));
        if last == Phase::Resolve {
            report.graph = Some(graph);
            return Ok(report);
        }

        observer.phase_started(Phase::Plan);
        let plan = self.plan().await?;
        observer.phase_finished(Phase::Plan, &plan.root.display().to_string());
        if last == Phase::Plan {
            report.graph = Some(graph);
            report.plan = Some(plan);
            return Ok(report);
        }

        observer.phase_started(Phase::Generate);
        report.artifacts = self.generate(&graph, &plan).await?;
        observer.phase_finished(Phase::Generate, &format!("{} files", report.artifacts.len()));

        if last >= Phase::Configure {
            observer.phase_started(Phase::Configure);
            let configured = self.configure(&plan, &on_output).await?;
            observer.phase_finished(Phase::Configure, &format_duration(&configured));

            if last >= Phase::Build {
                observer.phase_started(Phase::Build);
                let built = self.build(&plan, &on_output).await?;
                observer.phase_finished(Phase::Build, &format_duration(&built));

                BuildRecord::new(&plan, graph.digest(), self.backend.name(), &configured, &built)
                    .write(&plan)
                    .await?;
                info!("Build of {} finished", self.recipe.identity);
                report.build = Some(built);
            }
            report.configure = Some(configured);
        }

        report.graph = Some(graph);
        report.plan = Some(plan);
        Ok(report)
    }
}

fn format_duration(outcome: &StepOutcome) -> String {
    format!("{:.1}s", outcome.duration.as_secs_f64())
}
