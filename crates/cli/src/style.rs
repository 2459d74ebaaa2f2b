//! Shared styling utilities for console output.

use console::Style;

use pwsync_core::models::AccountStatus;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Status marker for a single account line.
pub fn status_marker(status: AccountStatus) -> String {
    match status {
        AccountStatus::Updated => Style::new().green().apply_to("●").to_string(),
        AccountStatus::Unchanged => Style::new().dim().apply_to("○").to_string(),
        AccountStatus::Skipped => Style::new().blue().apply_to("–").to_string(),
        AccountStatus::Unresolved => Style::new().yellow().apply_to("?").to_string(),
    }
}
