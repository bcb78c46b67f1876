//! # Utility Functions Module
//!
//! Small helpers for building child-process argument lists and for keeping
//! tool diagnostics readable in logs.

use std::path::Path;

/// Converts any iterable of displayable items into owned strings.
///
/// Used to build encoder argument lists without a `.to_string()` on every element.
///
/// # Example
/// ```rust,ignore
/// let height = 360;
/// let args = to_string_vec(["-vf", &format!("scale=-2:{}", height), "-an"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Build a `Vec<String>` of arguments from mixed literals and values.
///
/// ```rust,ignore
/// let crf = 23;
/// let args = args!["-crf", crf, "-preset", "ultrafast"];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Lossy string form of a path, for passing to child processes and logs
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Keep the last `max_lines` non-empty lines of a tool's stderr.
///
/// ffmpeg prints its banner and stream dump before the actual error, so the
/// tail is what matters.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
