//! Path resolution, ANSI stripping, and time formatting for the log file.
use std::path::{Path, PathBuf};

const APP_DIR: &str = "macprov";

/// Strip ANSI escape sequences from a string.
///
/// Removes CSI sequences (`ESC [` ... final byte in `@`..`~`) and drops the
/// single character after a bare `ESC`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if let Some(next) = chars.next()
                && next == '['
            {
                for inner in chars.by_ref() {
                    if ('@'..='~').contains(&inner) {
                        break;
                    }
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `$XDG_CACHE_HOME/macprov`, falling back to `~/.cache/macprov`.
#[must_use]
pub fn log_dir() -> PathBuf {
    std::env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map_or_else(
            || {
                std::env::var_os("HOME")
                    .map_or_else(|| PathBuf::from("."), PathBuf::from)
                    .join(".cache")
            },
            PathBuf::from,
        )
        .join(APP_DIR)
}

/// Log file for `command` inside `dir`.
pub(super) fn log_file_path(dir: &Path, command: &str) -> PathBuf {
    dir.join(format!("{command}.log"))
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current UTC time as `HH:MM:SS.mmm`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S%.3f").to_string()
}
