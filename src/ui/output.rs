//! Step, banner and key/value output

use super::context::UiContext;
use console::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Ok,
    Warn,
    Info,
}

/// One status line; cliclack log entry when interactive, tagged line otherwise
fn step(ctx: &UiContext, level: Level, message: &str) {
    if ctx.use_fancy_output() {
        let _ = match level {
            Level::Ok => cliclack::log::success(message),
            Level::Warn => cliclack::log::warning(message),
            Level::Info => cliclack::log::info(message),
        };
        return;
    }

    let tag = match level {
        Level::Ok => style("[OK]").green(),
        Level::Warn => style("[WARN]").yellow(),
        Level::Info => style("[INFO]").cyan(),
    };
    println!("  {} {}", tag, message);
}

/// Command banner, e.g. `kiln build myproject/0.1`
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        let _ = cliclack::intro(style(title).cyan().bold());
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    outro(ctx, message, true);
}

pub fn outro_error(ctx: &UiContext, message: &str) {
    outro(ctx, message, false);
}

fn outro(ctx: &UiContext, message: &str, ok: bool) {
    let styled = if ok {
        style(message).green().bold()
    } else {
        style(message).red().bold()
    };
    if ctx.use_fancy_output() {
        let _ = cliclack::outro(styled);
    } else if ok {
        println!("{} {}", style("[OK]").green(), message);
    } else {
        println!("{} {}", style("[ERROR]").red(), message);
    }
}

pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        let _ = cliclack::log::info(style(title).bold());
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    step(ctx, Level::Ok, message);
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(ctx, Level::Ok, &format!("{} ({})", message, style(detail).dim()));
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    step(ctx, Level::Warn, &format!("{} - {}", message, style(hint).dim()));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, Level::Info, message);
}

/// Dimmed secondary line
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        let _ = cliclack::log::remark(message);
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    key_values(ctx, &[(key, value)]);
}

/// Key/value block with keys padded to a common width
pub fn key_values(ctx: &UiContext, pairs: &[(&str, &str)]) {
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in pairs {
        let key = format!("{:<width$}", key, width = width);
        if ctx.use_fancy_output() {
            println!("  {}  {}", style(key).dim(), value);
        } else {
            println!("  {}  {}", key, value);
        }
    }
}
