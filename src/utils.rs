use colored::Colorize;
use std::time::Duration;

/// Print a non-fatal warning to stderr.
pub fn print_warning(message: impl AsRef<str>) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message.as_ref());
}

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    if total_secs >= 60 {
        format!("{} min {} sec", total_secs / 60, total_secs % 60)
    } else {
        format!("{:.1} sec", duration.as_secs_f64())
    }
}
