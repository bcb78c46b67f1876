//! # Tool Path Resolver
//!
//! Finds the external encoding tools (`ffmpeg`, `ffprobe`) in:
//! - a bundled tools directory (`TOOLS_DIR`, laid out as `<dir>/<platform>/<tool>`
//!   or flat `<dir>/<tool>`)
//! - the system `PATH`

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tools the pipeline shells out to
pub const REQUIRED_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Tool path resolver for bundled and system-installed binaries
#[derive(Debug, Clone)]
pub struct ToolPathResolver {
    /// Directory holding bundled binaries
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver from the `TOOLS_DIR` environment variable
    pub fn new() -> Self {
        let tools_dir = env::var_os("TOOLS_DIR")
            .map(PathBuf::from)
            .filter(|dir| {
                let exists = dir.is_dir();
                if !exists {
                    warn!("TOOLS_DIR does not exist, ignoring: {}", dir.display());
                }
                exists
            });
        Self { tools_dir }
    }

    /// Create a resolver that looks in `dir` before `PATH`
    pub fn with_tools_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(dir.into()),
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        if let Some(ref tools_dir) = self.tools_dir {
            if let Some(bundled) = Self::bundled_tool_path(tools_dir, tool_name) {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        if let Some(system_path) = Self::find_in_system_path(tool_name) {
            debug!("Using system tool: {} -> {:?}", tool_name, system_path);
            return Some(system_path);
        }

        warn!("Tool not found: {}", tool_name);
        None
    }

    fn bundled_tool_path(tools_dir: &Path, tool_name: &str) -> Option<PathBuf> {
        let platform = match env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let file_name = executable_name(tool_name);

        [
            tools_dir.join(platform).join(&file_name),
            tools_dir.join(platform).join(tool_name).join(&file_name),
            tools_dir.join(&file_name),
        ]
        .into_iter()
        .find(|path| is_executable(path))
    }

    /// Find tool in system PATH
    fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
        let file_name = executable_name(tool_name);
        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(&file_name))
            .find(|path| is_executable(path))
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// Get installation instructions for a tool
    pub fn install_instructions(tool_name: &str) -> String {
        match (env::consts::OS, tool_name) {
            ("linux", "ffmpeg" | "ffprobe") => "sudo apt-get install ffmpeg".to_string(),
            ("macos", "ffmpeg" | "ffprobe") => "brew install ffmpeg".to_string(),
            ("windows", "ffmpeg" | "ffprobe") => "winget install ffmpeg".to_string(),
            _ => format!("install {} and make sure it is on PATH", tool_name),
        }
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::from("Tool availability\n");
        report.push_str(&format!("Bundled tools dir: {:?}\n", self.tools_dir));

        for tool in REQUIRED_TOOLS {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {}\n", tool, path.display())),
                None => report.push_str(&format!(
                    "  ❌ {} (install with: {})\n",
                    tool,
                    Self::install_instructions(tool)
                )),
            }
        }

        report
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// A regular file the current user may run
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Platform-specific executable file name
pub fn executable_name(tool_name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool_name)
    } else {
        tool_name.to_string()
    }
}
