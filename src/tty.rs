use std::io::IsTerminal;

use crate::colors::ColorScheme;
use crate::config::ColorMode;
use crate::error::ErrorRecord;

/// Check if stdout is connected to a TTY
pub fn is_stdout_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Check if stderr is connected to a TTY
pub fn is_stderr_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Determine if colors should be used based on CLI color mode and environment
pub fn should_use_colors_with_mode(color_mode: ColorMode, is_tty: bool) -> bool {
    match color_mode {
        ColorMode::Never => false,
        // Even with Always, respect NO_COLOR
        ColorMode::Always => std::env::var_os("NO_COLOR").is_none(),
        ColorMode::Auto => should_use_colors_auto(is_tty),
    }
}

fn should_use_colors_auto(is_tty: bool) -> bool {
    // Respect NO_COLOR environment variable (https://no-color.org/)
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    // Check FORCE_COLOR for CI environments that support colors
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }

    is_tty
}

/// One line of the stderr error panel
pub fn format_diagnostic(record: &ErrorRecord, colors: &ColorScheme) -> String {
    let mut line = format!(
        "{}chantail:{} {}",
        colors.error, colors.reset, record
    );
    if let Some(offending) = &record.offending_line {
        line.push_str(&format!("\n  line: {}", offending));
    }
    line
}
