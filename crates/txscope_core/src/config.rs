//! Bind, session and logging configuration.
//!
//! # Responsibility
//! - Deserialize the TOML configuration consumed at startup.
//! - Reject unusable bind settings before any engine is built.
//!
//! # Invariants
//! - A bind named [`DEFAULT_BIND`] is always present after validation.
//! - Pool limits are non-zero and the journal mode is one SQLite accepts.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reserved bind name for the default database.
pub const DEFAULT_BIND: &str = "default";

const JOURNAL_MODES: &[&str] = &["delete", "truncate", "persist", "memory", "wal", "off"];

/// Root configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub binds: BTreeMap<String, BindConfig>,
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

/// Connection url and pool settings of one bind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_overflow")]
    pub max_overflow: usize,
    #[serde(default = "default_pool_timeout_ms")]
    pub pool_timeout_ms: u64,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
}

/// Defaults applied to shared (scope-owned) sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionDefaults {
    #[serde(default = "default_true")]
    pub expire_on_commit: bool,
    #[serde(default = "default_true")]
    pub autoflush: bool,
}

/// File logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub dir: PathBuf,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

/// Where a bind's connections point to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    File(PathBuf),
    Memory,
}

impl DatabaseConfig {
    /// Builds a configuration with only the default bind.
    pub fn new(default_url: impl Into<String>) -> Self {
        let mut binds = BTreeMap::new();
        binds.insert(DEFAULT_BIND.to_string(), BindConfig::new(default_url));
        Self {
            binds,
            session: SessionDefaults::default(),
            logging: None,
        }
    }

    /// Adds or replaces a named bind.
    pub fn with_bind(mut self, bind_name: impl Into<String>, bind: BindConfig) -> Self {
        self.binds.insert(bind_name.into(), bind);
        self
    }

    pub fn with_session(mut self, session: SessionDefaults) -> Self {
        self.session = session;
        self
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.binds.contains_key(DEFAULT_BIND) {
            return Err(ConfigError::MissingDefaultBind);
        }
        for (bind_name, bind) in &self.binds {
            bind.validate(bind_name)?;
        }
        Ok(())
    }
}

impl BindConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: default_pool_size(),
            max_overflow: default_max_overflow(),
            pool_timeout_ms: default_pool_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
        }
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn max_overflow(mut self, max_overflow: usize) -> Self {
        self.max_overflow = max_overflow;
        self
    }

    pub fn pool_timeout_ms(mut self, pool_timeout_ms: u64) -> Self {
        self.pool_timeout_ms = pool_timeout_ms;
        self
    }

    /// Upper bound of simultaneously checked-out connections.
    pub fn max_connections(&self) -> usize {
        self.pool_size + self.max_overflow
    }

    /// Parses `url` into a connect target.
    ///
    /// Accepts `sqlite://<path>`, `sqlite::memory:`, `:memory:` and bare paths.
    pub fn target(&self) -> Result<ConnectTarget, String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err("url cannot be empty".to_string());
        }
        if url == ":memory:" || url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Ok(ConnectTarget::Memory);
        }
        let path = match url.strip_prefix("sqlite://") {
            Some(rest) => rest,
            None if url.contains("://") => {
                return Err(format!("unsupported url scheme in `{url}`"));
            }
            None => url,
        };
        if path.is_empty() {
            return Err(format!("url `{url}` has no database path"));
        }
        Ok(ConnectTarget::File(PathBuf::from(path)))
    }

    fn validate(&self, bind_name: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBind {
            bind_name: bind_name.to_string(),
            reason,
        };

        if bind_name.trim().is_empty() {
            return Err(invalid("bind name cannot be empty".to_string()));
        }
        self.target().map_err(invalid)?;
        if self.pool_size == 0 {
            return Err(invalid("pool_size must be at least 1".to_string()));
        }
        if self.pool_timeout_ms == 0 {
            return Err(invalid("pool_timeout_ms must be at least 1".to_string()));
        }
        let mode = self.journal_mode.to_ascii_lowercase();
        if !JOURNAL_MODES.contains(&mode.as_str()) {
            return Err(invalid(format!(
                "unsupported journal_mode `{}`; expected {}",
                self.journal_mode,
                JOURNAL_MODES.join("|")
            )));
        }
        Ok(())
    }
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            expire_on_commit: true,
            autoflush: true,
        }
    }
}

fn default_pool_size() -> usize {
    5
}

fn default_max_overflow() -> usize {
    10
}

fn default_pool_timeout_ms() -> u64 {
    30_000
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_journal_mode() -> String {
    "wal".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    crate::logging::default_log_level().to_string()
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_files() -> usize {
    5
}
