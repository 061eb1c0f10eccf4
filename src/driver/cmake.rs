//! CMake backend

use super::{output_tail, run_streamed, BuildBackend, BuildResult, ConfigureResult, StepOutcome};
use crate::cancel::CancelToken;
use crate::error::{BuildError, ConfigureError, KilnResult};
use crate::generators::TOOLCHAIN_FILE;
use crate::layout::LayoutPlan;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

/// Drives `cmake` for configure and build
#[derive(Debug, Clone)]
pub struct CMakeBackend {
    program: String,
    generator: Option<String>,
    jobs: Option<usize>,
}

impl CMakeBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            generator: None,
            jobs: None,
        }
    }

    /// CMake generator (`-G`), e.g. `Ninja`
    pub fn with_generator(mut self, generator: Option<String>) -> Self {
        self.generator = generator;
        self
    }

    /// Parallel build jobs (`--parallel`)
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn configure_args(&self, plan: &LayoutPlan) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            plan.source_dir.display().to_string(),
            "-B".to_string(),
            plan.build_dir.display().to_string(),
            format!(
                "-DCMAKE_TOOLCHAIN_FILE={}",
                plan.generators_dir.join(TOOLCHAIN_FILE).display()
            ),
            format!("-DCMAKE_BUILD_TYPE={}", plan.build_type),
        ];
        if let Some(generator) = &self.generator {
            args.push("-G".to_string());
            args.push(generator.clone());
        }
        args
    }

    pub fn build_args(&self, plan: &LayoutPlan) -> Vec<String> {
        let mut args = vec![
            "--build".to_string(),
            plan.build_dir.display().to_string(),
            "--config".to_string(),
            plan.build_type.to_string(),
        ];
        if let Some(jobs) = self.jobs {
            args.push("--parallel".to_string());
            args.push(jobs.to_string());
        }
        args
    }

    fn command(&self, args: &[String]) -> (Command, String) {
        let mut command = Command::new(&self.program);
        command.args(args);
        let label = format!("{} {}", self.program, args.join(" "));
        (command, label)
    }
}

impl Default for CMakeBackend {
    fn default() -> Self {
        Self::new("cmake")
    }
}

#[async_trait]
impl BuildBackend for CMakeBackend {
    fn name(&self) -> &'static str {
        "cmake"
    }

    async fn configure(
        &self,
        plan: &LayoutPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
        cancel: &CancelToken,
    ) -> KilnResult<ConfigureResult> {
        let toolchain = plan.generators_dir.join(TOOLCHAIN_FILE);
        if !toolchain.is_file() {
            return Err(ConfigureError {
                status: None,
                output: format!("toolchain file not found: {} (run generate first)", toolchain.display()),
            }
            .into());
        }

        let (command, label) = self.command(&self.configure_args(plan));
        let finished = run_streamed(command, &label, on_output, cancel).await?;
        if !finished.status.success() {
            return Err(ConfigureError {
                status: finished.status.code(),
                output: output_tail(&finished.output),
            }
            .into());
        }

        info!("Configured {} in {:.1}s", plan.build_dir.display(), finished.duration.as_secs_f64());
        Ok(StepOutcome {
            command: label,
            duration: finished.duration,
            output_lines: finished.output.len(),
        })
    }

    async fn build(
        &self,
        plan: &LayoutPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
        cancel: &CancelToken,
    ) -> KilnResult<BuildResult> {
        let (command, label) = self.command(&self.build_args(plan));
        let finished = run_streamed(command, &label, on_output, cancel).await?;
        if !finished.status.success() {
            return Err(BuildError {
                status: finished.status.code(),
                output: output_tail(&finished.output),
            }
            .into());
        }

        info!("Built {} in {:.1}s", plan.identity, finished.duration.as_secs_f64());
        Ok(StepOutcome {
            command: label,
            duration: finished.duration,
            output_lines: finished.output.len(),
        })
    }
}
