//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug.
//! - Logging flags are global so they may follow the subcommand.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::config::types::{parse_mode, Config, LogLevel};

/// Filesystem utility: create, copy, mirror, dump, link and lock.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Composable filesystem operations with safe overwrite rules")]
pub struct Args {
    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        global = true,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON.
    #[arg(long, global = true, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print where fsutil will look for the config file, then exit.
    #[arg(long, help = "Print the config file location used by fsutil and exit")]
    pub print_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create directories and their missing parents
    Mkdir {
        #[arg(required = true, value_hint = ValueHint::DirPath)]
        paths: Vec<PathBuf>,
    },
    /// Create files if missing and set their times
    Touch {
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        paths: Vec<PathBuf>,
        /// Modification time, seconds since the Unix epoch (default: now)
        #[arg(long)]
        mtime: Option<u64>,
        /// Access time, seconds since the Unix epoch (default: mtime)
        #[arg(long)]
        atime: Option<u64>,
    },
    /// Print `true` if every path exists, `false` otherwise
    Exists {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Copy a file; an existing target is replaced only if older
    Copy {
        source: PathBuf,
        target: PathBuf,
        /// Replace the target even when it is newer
        #[arg(long)]
        overwrite_newer: bool,
    },
    /// Atomically write a file
    Dump {
        path: PathBuf,
        #[arg(required_unless_present = "from_stdin")]
        content: Option<String>,
        /// Read the content from standard input
        #[arg(long, conflicts_with = "content")]
        from_stdin: bool,
    },
    /// Append to a file
    Append { path: PathBuf, content: String },
    /// Rename a file or directory
    Rename {
        source: PathBuf,
        target: PathBuf,
        /// Replace an existing target
        #[arg(long)]
        overwrite: bool,
    },
    /// Remove files and directory trees; missing paths are ignored
    Remove {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Create a symbolic link TARGET pointing to ORIGIN
    Symlink {
        origin: PathBuf,
        target: PathBuf,
        /// Replace whatever exists at TARGET
        #[arg(long)]
        replace: bool,
    },
    /// Print a link's target
    Readlink {
        path: PathBuf,
        /// Print the fully resolved path instead
        #[arg(long)]
        canonicalize: bool,
    },
    /// Change permission bits (octal)
    Chmod {
        #[arg(value_parser = parse_mode)]
        mode: u32,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, value_parser = parse_mode, default_value = "0")]
        umask: u32,
        #[arg(long)]
        recursive: bool,
    },
    /// Copy a directory tree into another
    Mirror {
        source: PathBuf,
        destination: PathBuf,
        /// Copy files even when the destination copy is newer
        #[arg(long)]
        override_newer: bool,
        /// Remove destination entries missing from the source
        #[arg(long)]
        delete: bool,
    },
    /// Print the path of END relative to the directory START
    Relative { end: PathBuf, start: PathBuf },
    /// Print whether PATH is absolute
    IsAbsolute { path: String },
    /// Take a named lock; with a command after `--`, run it while holding the lock
    Lock {
        name: String,
        /// Directory holding the lock file (default: system temp dir)
        #[arg(long, value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
        #[arg(last = true, value_name = "CMD")]
        command: Vec<String>,
    },
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(path) = &self.log_file {
            cfg.log_file = Some(path.clone());
        }
        if self.json {
            cfg.json = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
