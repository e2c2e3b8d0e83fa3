//! Error taxonomy for store configuration, scoping and transactions.
//!
//! # Responsibility
//! - Separate boot-time configuration failures from runtime resolution and
//!   transaction failures.
//! - Keep the original SQLite error reachable through `source()`.
//!
//! # Invariants
//! - `ConfigError` is only produced while loading config or building the
//!   engine registry; callers are expected to abort startup on it.
//! - Transient-guard violations are raised before any connection is touched.
//! - Write conflicts between sessions of one scope are raised before the
//!   write reaches SQLite.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Configuration problems detected at load or registry build time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("bind `default` is required but not configured")]
    MissingDefaultBind,
    #[error("bind `{bind_name}` is invalid: {reason}")]
    InvalidBind { bind_name: String, reason: String },
    #[error("entity `{entity}` is bound to unknown bind `{bind_name}`")]
    UnknownEntityBind {
        entity: &'static str,
        bind_name: String,
    },
    #[error("entity `{entity}` is bound to both `{first}` and `{second}`")]
    ConflictingEntityBind {
        entity: &'static str,
        first: String,
        second: String,
    },
    #[error("table `{table}` is bound to both `{first}` and `{second}`")]
    ConflictingTableBind {
        table: String,
        first: String,
        second: String,
    },
}

/// Failures resolving the current unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("no request is active on the current scope")]
    NoActiveRequest,
}

/// Umbrella error for every fallible store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("database bind `{0}` is not configured")]
    UnknownBind(String),
    #[error("transient sql expressions must not contain `{keyword}` keyword")]
    TransientSqlRequired { keyword: String },
    #[error(
        "session transaction was rolled back by a subtransaction; \
         roll back the session before using it again"
    )]
    InactiveTransaction,
    #[error("scoped session is already present, no new options may be specified")]
    SessionAlreadyPresent,
    #[error("savepoint `{name}` is not the innermost active savepoint")]
    SavepointOrder { name: String },
    #[error("timed out after {waited_ms} ms waiting for a connection on bind `{bind_name}`")]
    PoolTimeout { bind_name: String, waited_ms: u128 },
    #[error("failed to build connection pool for bind `{bind_name}`: {source}")]
    Pool {
        bind_name: String,
        #[source]
        source: r2d2::Error,
    },
    #[error(
        "bind `{bind_name}` is write-locked by session {holder} of the same scope; \
         commit or roll it back before writing from another session"
    )]
    WriteConflict { bind_name: String, holder: Uuid },
    #[error("sqlite error on bind `{bind_name}`: {source}")]
    Sqlite {
        bind_name: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub(crate) fn sqlite(bind_name: &str, source: rusqlite::Error) -> Self {
        Self::Sqlite {
            bind_name: bind_name.to_string(),
            source,
        }
    }

    /// Returns whether this error was raised by the transient SQL guard.
    pub fn is_transient_violation(&self) -> bool {
        matches!(self, Self::TransientSqlRequired { .. })
    }
}
