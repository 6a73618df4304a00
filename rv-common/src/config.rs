//! Configuration loading and resolution
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Policy, Result};

pub const ENV_CONFIG: &str = "RADARVARSLER_CONFIG";
pub const ENV_BIND: &str = "RADARVARSLER_BIND";
pub const ENV_DATABASE: &str = "RADARVARSLER_DATABASE";

const DEFAULT_BIND: &str = "127.0.0.1:5730";

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the HTTP API
    pub bind: SocketAddr,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Aggregation and warning policy
    pub policy: Policy,
}

/// On-disk config file shape
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    bind: Option<String>,
    database: Option<PathBuf>,
    policy: Policy,
}

impl Config {
    /// Resolve configuration from CLI arguments, environment, and config file.
    ///
    /// `cli_*` values come from clap in the binary; any of them may be absent.
    pub fn resolve(
        cli_config: Option<&Path>,
        cli_bind: Option<&str>,
        cli_database: Option<&Path>,
    ) -> Result<Config> {
        let file = load_config_file(cli_config)?;

        let bind_str = cli_bind
            .map(str::to_string)
            .or_else(|| std::env::var(ENV_BIND).ok())
            .or_else(|| file.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| Error::Config(format!("Invalid bind address: {bind_str}")))?;

        let database_path = cli_database
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_DATABASE).ok().map(PathBuf::from))
            .or_else(|| file.database.clone())
            .unwrap_or_else(default_database_path);

        Ok(Config {
            bind,
            database_path,
            policy: file.policy,
        })
    }
}

/// Locate and parse the config file, if any.
///
/// Explicitly-named files (CLI or environment) must exist and parse; the
/// platform-default location is optional and silently skipped when absent.
fn load_config_file(cli_config: Option<&Path>) -> Result<ConfigFile> {
    let explicit = cli_config
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));

    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(ConfigFile::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
}

/// Platform-default config file location, e.g. ~/.config/radarvarsler/config.toml
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("radarvarsler").join("config.toml"))
}

/// Platform-default database location, e.g. ~/.local/share/radarvarsler/radarvarsler.db
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("radarvarsler").join("radarvarsler.db"))
        .unwrap_or_else(|| PathBuf::from("radarvarsler.db"))
}
