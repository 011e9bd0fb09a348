//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::fs_ops::Options;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// Per-operation detail
    Info,
    /// Everything, including lock attempts
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Parse an octal permission string: `644`, `0644` or `0o644`.
pub fn parse_mode(s: &str) -> Result<u32, String> {
    let t = s.trim();
    let digits = t
        .strip_prefix("0o")
        .or_else(|| t.strip_prefix("0O"))
        .unwrap_or(t);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: '{s}'"))?;
    if mode > 0o7777 {
        return Err(format!("mode out of range: '{s}'"));
    }
    Ok(mode)
}

/// Runtime configuration for the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Mode requested for created directories (before umask)
    pub dir_mode: u32,
    /// Mode requested for dumped files (before umask)
    pub file_mode: u32,
    pub umask: u32,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Emit structured JSON logs
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        let opts = Options::default();
        Self {
            dir_mode: opts.dir_mode,
            file_mode: opts.file_mode,
            umask: opts.umask,
            log_level: LogLevel::Normal,
            log_file: None,
            json: false,
        }
    }
}

impl Config {
    /// Modes handed to `Filesystem::with_options`.
    pub fn fs_options(&self) -> Options {
        Options {
            dir_mode: self.dir_mode,
            file_mode: self.file_mode,
            umask: self.umask,
        }
    }
}
