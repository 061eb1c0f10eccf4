//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (shows immediately in interactive mode)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            // Plain output for CI
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Update the spinner message; plain mode prints nothing
    pub fn message(&mut self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.start(message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            // Fallback if spinner wasn't started
            println!("{} {}", style("✓").green(), message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else if self.interactive {
            println!("{} {}", style("✗").red(), message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Progress bar for native builds.
///
/// Understands the step markers CMake's generators print: `[ 42%] ...` from
/// Makefiles and `[3/10] ...` from Ninja. Other lines become the bar message
/// in interactive mode and are dropped in plain mode.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
}

/// One recognized progress marker
#[derive(Debug, PartialEq, Eq)]
enum BuildStep<'a> {
    Percent(u64, &'a str),
    Count(u64, u64, &'a str),
}

impl BuildProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(100);
            let style = ProgressStyle::default_bar()
                .template("  {spinner:.cyan} Building {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .progress_chars("━╸─");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Building {}...", label);
            None
        };
        Self { bar }
    }

    /// Feed one line of build output
    pub fn on_line(&self, line: String) {
        match (parse_build_step(&line), &self.bar) {
            (Some(BuildStep::Percent(pct, what)), Some(bar)) => {
                bar.set_length(100);
                bar.set_position(pct);
                bar.set_message(truncate(what));
            }
            (Some(BuildStep::Count(n, total, what)), Some(bar)) => {
                bar.set_length(total);
                bar.set_position(n);
                bar.set_message(truncate(what));
            }
            (Some(BuildStep::Percent(pct, what)), None) => println!("  [{:>3}%] {}", pct, what),
            (Some(BuildStep::Count(n, total, what)), None) => println!("  [{}/{}] {}", n, total, what),
            (None, Some(bar)) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !is_build_noise(trimmed) {
                    bar.set_message(truncate(trimmed));
                }
            }
            (None, None) => {}
        }
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Make's directory chatter and blank progress lines
fn is_build_noise(line: &str) -> bool {
    line.starts_with("make[")
        || line.starts_with("gmake[")
        || line.starts_with("Consolidate compiler generated dependencies")
}

/// Parse `[ 42%] what` or `[3/10] what`
fn parse_build_step(line: &str) -> Option<BuildStep<'_>> {
    let rest = line.trim_start().strip_prefix('[')?;
    let close = rest.find(']')?;
    let marker = rest[..close].trim();
    let what = rest[close + 1..].trim();

    if let Some(pct) = marker.strip_suffix('%') {
        let pct: u64 = pct.trim().parse().ok()?;
        return (pct <= 100).then_some(BuildStep::Percent(pct, what));
    }
    let (n, total) = marker.split_once('/')?;
    let n: u64 = n.parse().ok()?;
    let total: u64 = total.parse().ok()?;
    (n <= total).then_some(BuildStep::Count(n, total, what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Resolving...");
        spinner.stop("Done");
    }

    #[test]
    fn parse_makefile_percent() {
        assert_eq!(
            parse_build_step("[ 42%] Building CXX object CMakeFiles/app.dir/main.cpp.o"),
            Some(BuildStep::Percent(42, "Building CXX object CMakeFiles/app.dir/main.cpp.o"))
        );
        assert_eq!(
            parse_build_step("[100%] Built target app"),
            Some(BuildStep::Percent(100, "Built target app"))
        );
    }

    #[test]
    fn parse_ninja_count() {
        assert_eq!(
            parse_build_step("[3/10] Linking CXX executable app"),
            Some(BuildStep::Count(3, 10, "Linking CXX executable app"))
        );
    }

    #[test]
    fn parse_rejects_other_lines() {
        assert!(parse_build_step("-- Configuring done").is_none());
        assert!(parse_build_step("[main] not a step").is_none());
        assert!(parse_build_step("[11/10] impossible").is_none());
        assert!(parse_build_step("").is_none());
    }

    #[test]
    fn build_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = BuildProgress::new(&ctx, "myproject/0.1");
        progress.on_line("[ 50%] Building CXX object main.cpp.o".to_string());
        progress.on_line("make[2]: Entering directory '/ws/build'".to_string());
        progress.on_line("[2/2] Linking CXX executable app".to_string());
        progress.finish();
    }

    #[test]
    fn noise_filter() {
        assert!(is_build_noise("make[2]: Leaving directory '/ws/build'"));
        assert!(is_build_noise("gmake[1]: Entering directory"));
        assert!(!is_build_noise("/src/main.cpp:3:10: error: 'fmt/core.h' file not found"));
    }

    #[test]
    fn truncate_long_messages() {
        let long = "x".repeat(100);
        assert_eq!(truncate(&long).chars().count(), 60);
        assert_eq!(truncate("short"), "short");
    }
}
