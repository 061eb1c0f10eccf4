//! cliclack theme

use cliclack::ThemeState;
use console::Style;

/// Yellow bars, red on error
#[derive(Debug, Clone, Default)]
pub struct KilnTheme;

impl cliclack::Theme for KilnTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().yellow(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().yellow().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().yellow(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green(),
        }
    }
}

/// Install the theme globally; called once from `main`
pub fn init_theme() {
    cliclack::set_theme(KilnTheme);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliclack::Theme;

    #[test]
    fn error_state_is_red() {
        let theme = KilnTheme;
        let err = ThemeState::Error("bad".to_string());
        assert_eq!(
            theme.bar_color(&err).apply_to("x").to_string(),
            Style::new().red().apply_to("x").to_string()
        );
        let _ = theme.state_symbol_color(&ThemeState::Submit);
    }
}
