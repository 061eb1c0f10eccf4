//! Console progress for pipeline phases

use crate::pipeline::{Phase, PhaseObserver};
use crate::ui::{BuildProgress, TaskSpinner, UiContext};
use std::sync::Mutex;

/// Spinner per phase; a progress bar while the native build runs
pub(crate) struct ConsoleObserver {
    ctx: UiContext,
    label: String,
    current: Mutex<Option<Phase>>,
    spinner: Mutex<TaskSpinner>,
    build: Mutex<Option<BuildProgress>>,
}

impl ConsoleObserver {
    pub(crate) fn new(ctx: &UiContext, label: impl Into<String>) -> Self {
        Self {
            ctx: ctx.clone(),
            label: label.into(),
            current: Mutex::new(None),
            spinner: Mutex::new(TaskSpinner::new(ctx)),
            build: Mutex::new(None),
        }
    }

    /// Mark the running phase as failed
    pub(crate) fn abort(&self) {
        let phase = self.current.lock().ok().and_then(|mut current| current.take());
        if let Some(build) = self.build.lock().ok().and_then(|mut build| build.take()) {
            build.finish();
        }
        if let (Some(phase), Ok(mut spinner)) = (phase, self.spinner.lock()) {
            spinner.stop_error(&format!("{} failed", capitalize(phase.label())));
        }
    }
}

impl PhaseObserver for ConsoleObserver {
    fn phase_started(&self, phase: Phase) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(phase);
        }

        if phase == Phase::Build {
            if let Ok(mut build) = self.build.lock() {
                *build = Some(BuildProgress::new(&self.ctx, &self.label));
            }
            return;
        }

        if let Ok(mut spinner) = self.spinner.lock() {
            spinner.start(&format!("{}...", running_message(phase)));
        }
    }

    fn phase_finished(&self, phase: Phase, detail: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }

        if phase == Phase::Build {
            if let Some(build) = self.build.lock().ok().and_then(|mut build| build.take()) {
                build.finish();
            }
            if let Ok(mut spinner) = self.spinner.lock() {
                spinner.stop(&format!("Built {} ({})", self.label, detail));
            }
            return;
        }

        if let Ok(mut spinner) = self.spinner.lock() {
            spinner.stop(&format!("{} ({})", done_message(phase), detail));
        }
    }

    fn output_line(&self, line: String) {
        if let Ok(build) = self.build.lock() {
            if let Some(build) = build.as_ref() {
                build.on_line(line);
                return;
            }
        }

        // CMake configure progress lines start with "-- "
        if let Some(status) = line.strip_prefix("-- ") {
            if let Ok(mut spinner) = self.spinner.lock() {
                spinner.message(&format!("Configuring: {}", status));
            }
        }
    }
}

fn running_message(phase: Phase) -> &'static str {
    match phase {
        Phase::Validate => "Validating",
        Phase::Resolve => "Resolving requirements",
        Phase::Plan => "Planning layout",
        Phase::Generate => "Generating CMake files",
        Phase::Configure => "Configuring",
        Phase::Build => "Building",
    }
}

fn done_message(phase: Phase) -> &'static str {
    match phase {
        Phase::Validate => "Validated",
        Phase::Resolve => "Resolved",
        Phase::Plan => "Layout ready",
        Phase::Generate => "Generated",
        Phase::Configure => "Configured",
        Phase::Build => "Built",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_observer_runs_all_phases() {
        let observer = ConsoleObserver::new(&UiContext::non_interactive(), "myproject/0.1");
        for phase in [Phase::Resolve, Phase::Plan, Phase::Generate, Phase::Configure] {
            observer.phase_started(phase);
            observer.output_line("-- Detecting CXX compiler".to_string());
            observer.phase_finished(phase, "ok");
        }
        observer.phase_started(Phase::Build);
        observer.output_line("[ 50%] Building CXX object".to_string());
        assert!(observer.build.lock().unwrap().is_some());
        observer.phase_finished(Phase::Build, "1.0s");
        assert!(observer.build.lock().unwrap().is_none());
    }

    #[test]
    fn abort_clears_current_phase() {
        let observer = ConsoleObserver::new(&UiContext::non_interactive(), "myproject/0.1");
        observer.phase_started(Phase::Build);
        observer.abort();
        assert!(observer.current.lock().unwrap().is_none());
        assert!(observer.build.lock().unwrap().is_none());
    }

    #[test]
    fn capitalize_label() {
        assert_eq!(capitalize("configure"), "Configure");
        assert_eq!(capitalize(""), "");
    }
}
