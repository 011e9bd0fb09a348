//! Application orchestrator.
//! Loads/merges config, initializes logging, and dispatches the subcommand to `Filesystem`.

use anyhow::{Context, Result};
use std::io::{self, Read};
use std::process::{Command as Process, ExitCode};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

use fsutil::cli::{Args, Command};
use fsutil::config::{config_path, load_config, CONFIG_ENV};
use fsutil::output as out;
use fsutil::{
    is_absolute_path, make_path_relative, CopyOutcome, Filesystem, IoError, LockHandler,
    MirrorOptions,
};

use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<ExitCode> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = args.command.clone() else {
        out::print_error("no subcommand given; run with --help for usage");
        return Ok(ExitCode::FAILURE);
    };

    // Config file first, then CLI overrides (CLI wins).
    let mut cfg = load_config()?;
    args.apply_overrides(&mut cfg);

    // Held until return so the file appender flushes.
    let _guard = init_tracing(cfg.log_level, cfg.log_file.as_deref(), cfg.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e:#}"));
        e
    })?;

    debug!(?command, "starting fsutil");
    let fs = Filesystem::new().with_options(cfg.fs_options());
    dispatch(&fs, command)
}

fn print_config_location() {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):"));
        out::print_user(&explicit.to_string_lossy());
        return;
    }
    match config_path() {
        Some(p) => {
            out::print_info("Default config path:");
            out::print_user(&p.display().to_string());
            if !p.exists() {
                out::print_info("No config file exists there yet; built-in defaults apply.");
            }
        }
        None => out::print_error("Could not determine a default config path"),
    }
}

/// Log an operation failure with structured fields and hand it up.
fn failed(e: IoError) -> anyhow::Error {
    error!(
        op = %e.op(),
        path = %e.path().display(),
        code = ?e.raw_os_error(),
        "operation failed"
    );
    anyhow::Error::new(e)
}

fn epoch_secs(secs: Option<u64>) -> Option<SystemTime> {
    secs.map(|s| UNIX_EPOCH + Duration::from_secs(s))
}

fn bool_line(v: bool) -> &'static str {
    if v { "true" } else { "false" }
}

fn dispatch(fs: &Filesystem, command: Command) -> Result<ExitCode> {
    match command {
        Command::Mkdir { paths } => fs.mkdir(paths).map_err(failed)?,
        Command::Touch { paths, mtime, atime } => fs
            .touch(paths, epoch_secs(mtime), epoch_secs(atime))
            .map_err(failed)?,
        Command::Exists { paths } => out::print_user(bool_line(fs.exists(paths))),
        Command::Copy {
            source,
            target,
            overwrite_newer,
        } => match fs.copy(&source, &target, overwrite_newer).map_err(failed)? {
            CopyOutcome::Copied { bytes } => {
                info!(source = %source.display(), target = %target.display(), bytes, "copied")
            }
            CopyOutcome::Skipped => {
                info!(target = %target.display(), "target is up to date; skipped")
            }
        },
        Command::Dump {
            path,
            content,
            from_stdin,
        } => {
            let bytes = if from_stdin {
                let mut buf = Vec::new();
                io::stdin()
                    .read_to_end(&mut buf)
                    .context("read content from stdin")?;
                buf
            } else {
                content.unwrap_or_default().into_bytes()
            };
            fs.dump_file(&path, bytes).map_err(failed)?;
        }
        Command::Append { path, content } => fs.append_to_file(&path, content).map_err(failed)?,
        Command::Rename {
            source,
            target,
            overwrite,
        } => fs.rename(&source, &target, overwrite).map_err(failed)?,
        Command::Remove { paths } => fs.remove(paths).map_err(failed)?,
        Command::Symlink {
            origin,
            target,
            replace,
        } => fs.symlink(&origin, &target, replace).map_err(failed)?,
        Command::Readlink { path, canonicalize } => {
            match fs.read_link(&path, canonicalize).map_err(failed)? {
                Some(p) => out::print_user(&p.display().to_string()),
                None => return Ok(ExitCode::FAILURE),
            }
        }
        Command::Chmod {
            mode,
            paths,
            umask,
            recursive,
        } => fs.chmod(paths, mode, umask, recursive).map_err(failed)?,
        Command::Mirror {
            source,
            destination,
            override_newer,
            delete,
        } => {
            let opts = MirrorOptions {
                override_newer,
                delete,
            };
            fs.mirror(&source, &destination, opts).map_err(failed)?;
        }
        Command::Relative { end, start } => {
            out::print_user(&make_path_relative(&end, &start).map_err(failed)?)
        }
        Command::IsAbsolute { path } => out::print_user(bool_line(is_absolute_path(&path))),
        Command::Lock { name, dir, command } => return run_locked(&name, dir.as_deref(), &command),
    }
    Ok(ExitCode::SUCCESS)
}

/// Take the lock, run `command` (if any) while holding it and pass its exit code on.
fn run_locked(name: &str, dir: Option<&std::path::Path>, command: &[String]) -> Result<ExitCode> {
    let mut lock = LockHandler::new(name, dir).map_err(failed)?;
    if !lock.lock().map_err(failed)? {
        out::print_error(&format!("already locked: {}", lock.path().display()));
        return Ok(ExitCode::FAILURE);
    }
    info!(path = %lock.path().display(), "lock acquired");

    let Some((program, rest)) = command.split_first() else {
        out::print_user(&lock.path().display().to_string());
        return Ok(ExitCode::SUCCESS);
    };

    let status = Process::new(program)
        .args(rest)
        .status()
        .with_context(|| format!("run '{program}'"))?;
    lock.release();
    debug!(%status, "command finished; lock released");

    // A signal-terminated child has no code; report plain failure.
    let code = status.code().unwrap_or(1);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
