//! Tracing initialization.
//! Builds a subscriber with EnvFilter, supports compact or JSON formats, and optional file logging.
//!
//! Behavior:
//! - Log level is driven by LogLevel (no RUST_LOG override here).
//! - Console logs go to stderr; stdout carries command results only.
//! - If `log_file` is provided and passes safety checks, a non-blocking file layer is added.
//!
//! Implementation notes:
//! - We refuse file logging if any ancestor of the file path is a symlink.

use anyhow::{Context, Result};
use chrono::Local;
use fsutil::config::path_has_symlink_ancestor;
use fsutil::output as out;
use fsutil::LogLevel;
use std::fmt as stdfmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{registry, Layer, Registry};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Human-friendly timestamp formatter (DD/MM/YY HH:MM:SS)
struct LocalHumanTime;
impl FormatTime for LocalHumanTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

#[inline]
fn to_level_filter(lvl: LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::INFO,
        LogLevel::Info => LevelFilter::DEBUG,
        LogLevel::Debug => LevelFilter::TRACE,
    }
}

#[inline]
fn env_filter_from_level(level_filter: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level_filter.into())
}

fn fmt_layer<W>(writer: W, json: bool, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        tsfmt::layer()
            .json()
            .with_timer(LocalHumanTime)
            .with_level(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(writer)
            .boxed()
    } else {
        tsfmt::layer()
            .compact()
            .with_timer(LocalHumanTime)
            .with_level(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed()
    }
}

/// Open for append; a newly created file is private to the user.
fn open_log_file_append(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    opts.mode(0o600);
    opts.open(path)
}

/// Try to open a non-blocking file writer for logging:
/// - Refuse if any ancestor is a symlink
/// - Best-effort create parent directory
/// - Open file for append and wrap with non_blocking
fn maybe_open_non_blocking_writer(path: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    match path_has_symlink_ancestor(path) {
        Ok(true) => {
            out::print_warn(&format!(
                "refusing file logging: an ancestor of {} is a symlink",
                path.display()
            ));
            return None;
        }
        Err(e) => {
            out::print_warn(&format!(
                "cannot check log path {} for symlinks: {e}",
                path.display()
            ));
            return None;
        }
        Ok(false) => {}
    }

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match open_log_file_append(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            out::print_warn(&format!("cannot open log file {}: {e}", path.display()));
            None
        }
    }
}

/// Initialize tracing based on LogLevel and format. Returns an optional WorkerGuard
/// if a file appender is created (must be held until exit to flush logs).
pub fn init_tracing(
    lvl: LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let env_filter = env_filter_from_level(to_level_filter(lvl));
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(
        io::stderr,
        json,
        atty::is(atty::Stream::Stderr),
    )];

    let mut guard = None;
    if let Some(path) = log_file {
        match maybe_open_non_blocking_writer(path) {
            Some((writer, g)) => {
                layers.push(fmt_layer(writer, json, false));
                guard = Some(g);
            }
            None => out::print_info("continuing with stderr logging only"),
        }
    }

    registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_one_step_down() {
        assert_eq!(to_level_filter(LogLevel::Quiet), LevelFilter::ERROR);
        assert_eq!(to_level_filter(LogLevel::Normal), LevelFilter::INFO);
        assert_eq!(to_level_filter(LogLevel::Info), LevelFilter::DEBUG);
        assert_eq!(to_level_filter(LogLevel::Debug), LevelFilter::TRACE);
    }

    #[cfg(unix)]
    #[test]
    fn new_log_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fsutil.log");
        let _f = open_log_file_append(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_log_dir_refused() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(maybe_open_non_blocking_writer(&link.join("x.log")).is_none());
        assert!(!real.join("x.log").exists());
    }
}
