use std::env;
use std::fs;
use std::process::Command;

use fsutil::config::{config_path, load_config, LogLevel, CONFIG_ENV};
use serial_test::serial;
use tempfile::tempdir;

struct EnvGuard(Option<std::ffi::OsString>);

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        let prev = env::var_os(CONFIG_ENV);
        // Tests touching the process environment are #[serial].
        unsafe { env::set_var(CONFIG_ENV, value) };
        EnvGuard(prev)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.0.take() {
            Some(v) => unsafe { env::set_var(CONFIG_ENV, v) },
            None => unsafe { env::remove_var(CONFIG_ENV) },
        }
    }
}

#[test]
#[serial]
fn env_var_selects_config_file() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("custom.xml");
    fs::write(
        &cfg_path,
        "<config><umask>077</umask><log_level>quiet</log_level></config>",
    )
    .unwrap();
    let _g = EnvGuard::set(&cfg_path);

    assert_eq!(config_path(), Some(cfg_path.clone()));
    let cfg = load_config().unwrap();
    assert_eq!(cfg.umask, 0o077);
    assert_eq!(cfg.log_level, LogLevel::Quiet);
}

#[test]
#[serial]
fn missing_file_yields_defaults() {
    let td = tempdir().unwrap();
    let _g = EnvGuard::set(&td.path().join("absent.xml"));

    let cfg = load_config().unwrap();
    assert_eq!(cfg, fsutil::Config::default());
}

#[test]
#[serial]
fn malformed_file_is_an_error() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("bad.xml");
    fs::write(&cfg_path, "<config><umask>0022</umask>").unwrap();
    let _g = EnvGuard::set(&cfg_path);

    assert!(load_config().is_err());
}

#[test]
fn print_config_reports_env_path() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("explicit.xml");
    let out = Command::new(assert_cmd::cargo::cargo_bin!("fsutil"))
        .env(CONFIG_ENV, &cfg_path)
        .arg("--print-config")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains(&*cfg_path.to_string_lossy()));
}

#[cfg(unix)]
#[test]
fn binary_applies_modes_from_config() {
    use std::os::unix::fs::PermissionsExt;

    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(
        &cfg_path,
        "<config>\n  <file_mode>0640</file_mode>\n  <umask>0</umask>\n</config>\n",
    )
    .unwrap();
    let target = td.path().join("out.txt");

    let st = Command::new(assert_cmd::cargo::cargo_bin!("fsutil"))
        .env(CONFIG_ENV, &cfg_path)
        .arg("dump")
        .arg(&target)
        .arg("data")
        .status()
        .unwrap();
    assert!(st.success());

    let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
}
