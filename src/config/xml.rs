//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - A missing file means defaults; unknown elements are rejected.
//!
//! Example:
//! ```xml
//! <config>
//!   <dir_mode>0755</dir_mode>
//!   <file_mode>0644</file_mode>
//!   <umask>0022</umask>
//!   <log_level>normal</log_level>
//!   <log_file>/var/log/fsutil.log</log_file>
//!   <json>false</json>
//! </config>
//! ```

use anyhow::{anyhow, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::paths::config_path;
use super::types::{parse_mode, Config, LogLevel};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    dir_mode: Option<String>,
    file_mode: Option<String>,
    umask: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_bool_trimmed_opt")]
    json: Option<bool>,
}

// Accept " true " and friends; anything unparsable counts as absent.
fn de_bool_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|t| !t.is_empty())
}

// Map XmlConfig -> Config, starting from defaults.
fn xml_to_config(parsed: XmlConfig, origin: &Path) -> Result<Config> {
    let mut cfg = Config::default();

    let mode_field = |name: &str, value: Option<&str>| -> Result<Option<u32>> {
        non_empty(value)
            .map(|v| parse_mode(v).map_err(|e| anyhow!("{} in <{}> of '{}'", e, name, origin.display())))
            .transpose()
    };
    if let Some(m) = mode_field("dir_mode", parsed.dir_mode.as_deref())? {
        cfg.dir_mode = m;
    }
    if let Some(m) = mode_field("file_mode", parsed.file_mode.as_deref())? {
        cfg.file_mode = m;
    }
    if let Some(m) = mode_field("umask", parsed.umask.as_deref())? {
        cfg.umask = m;
    }

    if let Some(s) = non_empty(parsed.log_level.as_deref()) {
        match LogLevel::parse(s) {
            Some(level) => cfg.log_level = level,
            None => debug!(value = s, "ignoring unknown log_level in config"),
        }
    }
    cfg.log_file = non_empty(parsed.log_file.as_deref()).map(PathBuf::from);
    cfg.json = parsed.json.unwrap_or(false);

    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    xml_to_config(parsed, path)
}

/// Load the effective config: `$FSUTIL_CONFIG`, else the platform default path.
/// A missing file yields defaults.
pub fn load_config() -> Result<Config> {
    let Some(path) = config_path() else {
        debug!("no config directory available; using defaults");
        return Ok(Config::default());
    };
    if !path.exists() {
        debug!(path = %path.display(), "config file not found; using defaults");
        return Ok(Config::default());
    }
    debug!(path = %path.display(), "loading config");
    load_config_from_xml_path(&path)
}
