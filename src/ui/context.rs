//! Interactive vs CI detection

use std::io::IsTerminal;

/// Environment variables whose presence means "not a person at a terminal"
const NON_INTERACTIVE_VARS: &[&str] = &[
    "KILN_NO_INTERACTIVE",
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// How output and prompts behave for this invocation
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    /// `--yes`: prompts answer themselves
    auto_yes: bool,
}

impl UiContext {
    /// Detect from the terminal and environment
    pub fn detect() -> Self {
        let interactive = interactive_from(
            std::io::stdout().is_terminal(),
            std::io::stdin().is_terminal(),
            |var| std::env::var_os(var).is_some(),
        );
        Self {
            interactive,
            auto_yes: false,
        }
    }

    /// Plain output, no prompts
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Whether to draw spinners and progress bars
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

/// Interactive only with both ends on a TTY and no CI marker set
fn interactive_from(stdout_tty: bool, stdin_tty: bool, is_set: impl Fn(&str) -> bool) -> bool {
    stdout_tty && stdin_tty && !NON_INTERACTIVE_VARS.iter().any(|var| is_set(var))
}
