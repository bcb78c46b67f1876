//! # Platform-specific utilities
//!
//! Questo modulo centralizza la risoluzione cross-platform dei tool esterni
//! usati dal transcoder. Un path esplicito in configurazione ha sempre la
//! precedenza; altrimenti si delega a `ToolPathResolver` (bundled + PATH).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::TranscodeError;
use crate::tool_resolver::ToolPathResolver;

/// Process-wide tool lookup
pub struct PlatformCommands {
    tool_resolver: ToolPathResolver,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(|| Self {
            tool_resolver: ToolPathResolver::new(),
        })
    }

    /// Resolve `tool`, preferring an explicitly configured binary
    pub fn resolve(&self, tool: &str, explicit: Option<&Path>) -> Result<PathBuf, TranscodeError> {
        match explicit {
            Some(path) if path.is_file() => Ok(path.to_path_buf()),
            Some(path) => {
                // a bare name like "ffmpeg" is looked up like any other tool
                let name = path.to_string_lossy();
                self.tool_resolver
                    .resolve_tool(&name)
                    .ok_or_else(|| TranscodeError::ToolMissing { tool: name.to_string() })
            }
            None => self
                .tool_resolver
                .resolve_tool(tool)
                .ok_or_else(|| TranscodeError::ToolMissing { tool: tool.to_string() }),
        }
    }

    /// Check if a tool can be resolved
    pub fn is_command_available(&self, tool: &str) -> bool {
        self.tool_resolver.is_tool_available(tool)
    }

    /// Get a report of all required tools
    pub fn get_tools_report(&self) -> String {
        self.tool_resolver.get_tools_report()
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
