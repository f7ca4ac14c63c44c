//! Configuration file management for tripweave.
//!
//! A TOML file at `~/.config/tripweave/config.toml` plus a resolution chain:
//! CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tripweave_core::reasoner::ReasonerConfig;
use tripweave_db::config::DbConfig;

pub const REASONER_URL_ENV: &str = "TRIPWEAVE_REASONER_URL";
pub const REASONER_MODEL_ENV: &str = "TRIPWEAVE_REASONER_MODEL";
pub const REASONER_API_KEY_ENV: &str = "TRIPWEAVE_REASONER_API_KEY";
pub const REASONER_TIMEOUT_ENV: &str = "TRIPWEAVE_REASONER_TIMEOUT_SECS";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub reasoner: ReasonerSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the tripweave config directory: `$XDG_CONFIG_HOME/tripweave` or
/// `~/.config/tripweave`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tripweave");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tripweave")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Write the config file with owner-only permissions, creating parent
/// directories as needed. It may hold the reasoner API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct TripweaveConfig {
    pub db_config: DbConfig,
    pub reasoner: ReasonerConfig,
    pub server: ServerSettings,
}

impl TripweaveConfig {
    /// Resolve against the config file on disk, if there is one.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        Self::resolve_with(cli_db_url, load_config().ok())
    }

    /// Resolve each field: CLI flag > env var > `file` > default.
    ///
    /// - DB URL: `cli_db_url` > `TRIPWEAVE_DATABASE_URL` > `[database].url` > `DbConfig::DEFAULT_URL`
    /// - Reasoner: `TRIPWEAVE_REASONER_*` > `[reasoner]` > `ReasonerConfig::default()`
    /// - Server: `[server]` > `127.0.0.1:8080` (CLI flags are applied by the caller)
    pub fn resolve_with(cli_db_url: Option<&str>, file: Option<ConfigFile>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let db_url = cli_db_url
            .map(str::to_owned)
            .or_else(|| env_var(DbConfig::URL_ENV))
            .or_else(|| non_empty(file.database.url))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());

        let defaults = ReasonerConfig::default();
        let timeout_secs = match env_var(REASONER_TIMEOUT_ENV) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .with_context(|| format!("{REASONER_TIMEOUT_ENV} is not a number: {raw}"))?,
            ),
            None => file.reasoner.timeout_secs,
        };
        let reasoner = ReasonerConfig {
            base_url: env_var(REASONER_URL_ENV)
                .or(file.reasoner.base_url)
                .unwrap_or(defaults.base_url),
            model: env_var(REASONER_MODEL_ENV)
                .or(file.reasoner.model)
                .unwrap_or(defaults.model),
            api_key: env_var(REASONER_API_KEY_ENV).or(file.reasoner.api_key),
            timeout: timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        let server = ServerSettings {
            bind: file.server.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned()),
            port: file.server.port.unwrap_or(DEFAULT_PORT),
        };

        Ok(Self {
            db_config: DbConfig::new(db_url),
            reasoner,
            server,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(non_empty)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
