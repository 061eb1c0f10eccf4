//! Terminal output for kiln
//!
//! Uses `cliclack` for spinners and step logs in an interactive terminal and
//! falls back to plain prefixed lines in CI or when output is piped.
//!
//! ```rust,ignore
//! use kiln::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "kiln build myproject/0.1");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Resolving requirements...");
//! spinner.stop("Resolved 2 packages");
//!
//! ui::outro_success(&ctx, "Build finished");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_values, outro_error, outro_success, remark, section, step_info,
    step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{BuildProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, KilnTheme};
