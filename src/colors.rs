use clap::ValueEnum;

// Escape sequences for the three severity roles of the progress display.
// Emitted directly so that --color=always produces the same bytes no matter
// where stdout points.
pub const BOLD_RED: &str = "\x1b[1;31m";
pub const YELLOW: &str = "\x1b[33m";
pub const BOLD_GREEN: &str = "\x1b[1;32m";
pub const RESET: &str = "\x1b[0m";

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    // Collapsed to a plain bool once, when the logger is built. Auto defers
    // to the capability check `colored` applies to its own output.
    pub fn resolve(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => colored::control::SHOULD_COLORIZE.should_colorize(),
        }
    }
}

pub fn error(text: &str, enabled: bool) -> String {
    wrap(text, BOLD_RED, enabled)
}

pub fn warning(text: &str, enabled: bool) -> String {
    wrap(text, YELLOW, enabled)
}

pub fn good(text: &str, enabled: bool) -> String {
    wrap(text, BOLD_GREEN, enabled)
}

fn wrap(text: &str, color: &str, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    format!("{}{}{}", color, text, RESET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_colors_leave_text_untouched() {
        assert_eq!(error("x", false), "x");
        assert_eq!(warning("x", false), "x");
        assert_eq!(good("x", false), "x");
    }

    #[test]
    fn enabled_colors_wrap_with_a_reset() {
        assert_eq!(error("boom", true), "\x1b[1;31mboom\x1b[0m");
        assert_eq!(warning("hmm", true), "\x1b[33mhmm\x1b[0m");
        assert_eq!(good("ok", true), "\x1b[1;32mok\x1b[0m");
    }

    #[test]
    fn forced_modes_resolve_without_consulting_the_terminal() {
        assert!(ColorMode::Always.resolve());
        assert!(!ColorMode::Never.resolve());
    }
}
