//! Configuration for the mock backend.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard-mock/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

use crate::tokens::DEFAULT_ACCESS_TTL_SECS;

/// Errors that can occur when loading mock backend configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct MockConfigFile {
    server: ServerFileConfig,
    seed: Option<SeedUser>,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    access_ttl_secs: Option<u64>,
}

/// `[seed]` section: a verified account created at startup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SeedUser {
    /// Display name.
    pub name: String,
    /// Sign-in email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// CLI arguments for the mock backend.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "In-memory Taskboard backend")]
pub struct MockCliArgs {
    /// Address to bind to.
    #[arg(short, long, env = "TASKBOARD_MOCK_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskboard-mock/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Lifetime of issued access credentials, in seconds.
    #[arg(long)]
    pub access_ttl_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_MOCK_LOG")]
    pub log_level: String,
}

/// Fully resolved mock backend configuration.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Address to bind the server to.
    pub bind_addr: String,
    /// Access credential lifetime in seconds.
    pub access_ttl_secs: u64,
    /// Account to create at startup.
    pub seed: Option<SeedUser>,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl MockConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &MockCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, file))
    }

    fn resolve(cli: &MockCliArgs, file: MockConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or(file.server.bind_addr)
                .unwrap_or(defaults.bind_addr),
            access_ttl_secs: cli
                .access_ttl_secs
                .or(file.server.access_ttl_secs)
                .unwrap_or(defaults.access_ttl_secs),
            seed: file.seed,
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<MockConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(MockConfigFile::default());
        };
        config_dir.join("taskboard-mock").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MockConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
