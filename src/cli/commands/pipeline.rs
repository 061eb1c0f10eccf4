//! generate / configure / build commands

use super::observer::ConsoleObserver;
use super::prepare;
use crate::cancel::CancelToken;
use crate::cli::args::PipelineArgs;
use crate::config::Config;
use crate::error::KilnResult;
use crate::pipeline::{Phase, PipelineReport};
use crate::ui::{self, UiContext};

/// Run the pipeline through `last` with console progress
pub async fn execute(args: PipelineArgs, config: &Config, cancel: CancelToken, last: Phase) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let pipeline = prepare(args, config, cancel).await?;
    let label = pipeline.recipe().identity.to_string();

    ui::intro(&ctx, &format!("kiln {} {}", last, label));
    let workspace = pipeline.workspace().display().to_string();
    let mut header: Vec<(&str, &str)> = pipeline.settings().entries().into_iter().collect();
    header.push(("workspace", workspace.as_str()));
    ui::key_values(&ctx, &header);

    let observer = ConsoleObserver::new(&ctx, label.clone());
    let report = match pipeline.run_until(last, &observer).await {
        Ok(report) => report,
        Err(e) => {
            observer.abort();
            ui::outro_error(&ctx, &format!("{} failed", last));
            return Err(e);
        }
    };

    print_summary(&ctx, &report);
    ui::outro_success(&ctx, &outro_message(last, &label));
    Ok(())
}

fn print_summary(ctx: &UiContext, report: &PipelineReport) {
    if let Some(plan) = &report.plan {
        let build = plan.build_dir.display().to_string();
        let generators = plan.generators_dir.display().to_string();
        ui::section(ctx, "Layout");
        ui::key_values(ctx, &[("build", build.as_str()), ("generators", generators.as_str())]);
    }

    if !report.artifacts.is_empty() {
        ui::section(ctx, "Generated");
        for artifact in &report.artifacts {
            ui::key_value(ctx, artifact.generator, &artifact.path.display().to_string());
        }
    }

    if let Some(build) = &report.build {
        ui::remark(ctx, &format!("{} ({} lines of output)", build.command, build.output_lines));
    }
}

fn outro_message(last: Phase, label: &str) -> String {
    match last {
        Phase::Build => format!("Build of {} finished", label),
        Phase::Configure => format!("{} configured", label),
        _ => format!("CMake files for {} are ready", label),
    }
}
