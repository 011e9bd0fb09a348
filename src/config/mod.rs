//! Configuration.
//! Provides the runtime `Config`, default paths, and XML loading.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{config_path, default_config_path, path_has_symlink_ancestor, CONFIG_ENV};
pub use types::{parse_mode, Config, LogLevel};
pub use xml::{load_config, load_config_from_xml_path};
