//! Configuration system for the `Taskboard` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;

use taskboard_proto::task::TaskStatus;

use crate::board::OrderMode;

/// Errors that can occur when loading configuration.
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

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    backend: BackendFileConfig,
    storage: StorageFileConfig,
    session: SessionFileConfig,
}

/// `[backend]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BackendFileConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    path: Option<PathBuf>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    event_buffer: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Default backend root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API root, including the `/api` prefix.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// File holding the persisted credential.
    pub storage_path: PathBuf,
    /// Buffer size for the session event channel.
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            storage_path: default_storage_path(),
            event_buffer: 16,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path (`~/.config/taskboard/config.toml`)
    /// is tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separated from `load()` so it can be
    /// unit tested without CLI parsing.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            base_url: cli
                .base_url
                .clone()
                .or_else(|| file.backend.base_url.clone())
                .unwrap_or(defaults.base_url),
            request_timeout: cli
                .timeout_secs
                .or(file.backend.timeout_secs)
                .map_or(defaults.request_timeout, Duration::from_secs),
            storage_path: cli
                .storage
                .clone()
                .or_else(|| file.storage.path.clone())
                .unwrap_or(defaults.storage_path),
            event_buffer: file
                .session
                .event_buffer
                .unwrap_or(defaults.event_buffer),
        }
    }
}

/// `<data dir>/taskboard/session.json`, or the temp dir if there is no
/// data dir.
fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("taskboard")
        .join("session.json")
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task board client for the Taskboard REST backend")]
pub struct CliArgs {
    /// Backend API root (e.g. `http://localhost:8080/api`).
    #[arg(long, env = "TASKBOARD_URL")]
    pub base_url: Option<String>,

    /// Path to config file (default: `~/.config/taskboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File holding the persisted session credential.
    #[arg(long, env = "TASKBOARD_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKBOARD_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskboard.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sign in with email and password.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        #[arg(long, env = "TASKBOARD_PASSWORD")]
        password: String,
    },
    /// Adopt the credential from an OAuth success redirect URL.
    Oauth {
        /// The full redirect URL (`...?token=...`).
        redirect_url: String,
    },
    /// Create an account.
    Register {
        /// Display name.
        name: String,
        /// Account email.
        email: String,
        /// Account password.
        #[arg(long, env = "TASKBOARD_PASSWORD")]
        password: String,
    },
    /// Confirm an email address, or request a new code.
    Verify {
        /// Account email.
        email: String,
        /// Code from the verification email.
        code: Option<String>,
        /// Request a fresh code instead of verifying.
        #[arg(long)]
        resend: bool,
    },
    /// Request a password-reset email.
    ForgotPassword {
        /// Account email.
        email: String,
    },
    /// Set a new password with the emailed reset token.
    ResetPassword {
        /// Token from the reset email.
        token: String,
        /// New password.
        #[arg(long, env = "TASKBOARD_NEW_PASSWORD")]
        password: String,
    },
    /// Sign out locally and on the backend.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List tasks.
    Tasks {
        /// Only tasks of this list.
        #[arg(long)]
        list: Option<String>,
        /// Only tasks in this column (todo, in-progress, done).
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Only tasks due on this day (YYYY-MM-DD).
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// List the tasks pinned to "My Day".
    MyDay,
    /// List tasks due within a date range.
    Calendar {
        /// First day (YYYY-MM-DD).
        from: NaiveDate,
        /// Last day (YYYY-MM-DD).
        to: NaiveDate,
    },
    /// Create a task.
    Add {
        /// Task title.
        title: String,
        /// Owning list.
        #[arg(long)]
        list: Option<String>,
        /// Initial column.
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Due date (YYYY-MM-DD).
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Move a task to another column.
    Move {
        /// Task id.
        id: String,
        /// Target column (todo, in-progress, done).
        status: TaskStatus,
    },
    /// Delete a task.
    Delete {
        /// Task id.
        id: String,
    },
    /// List task lists.
    Lists,
    /// Create a task list.
    AddList {
        /// List name.
        name: String,
        /// Description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Show the status board.
    Board {
        /// Column ordering (manual, due-date, title).
        #[arg(long, default_value = "manual")]
        order: OrderMode,
        /// Only tasks of this list.
        #[arg(long)]
        list: Option<String>,
    },
    /// Delete the signed-in account.
    DeleteAccount,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskboard").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
