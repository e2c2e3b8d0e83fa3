//! Physical connection bootstrap for one bind.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for an engine's pool.
//! - Apply the pragmas every pooled connection must carry.
//! - Keep connections with an open transaction out of the pool.
//!
//! # Invariants
//! - Handed-out connections have `foreign_keys=ON`, the configured busy
//!   timeout and journal mode, and are in autocommit mode.

use crate::config::{BindConfig, ConnectTarget};
use log::{error, info};
use r2d2::{CustomizeConnection, HandleError, ManageConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::{Duration, Instant};

/// Connection manager for one bind.
///
/// Connections returned while a transaction is still open are reported as
/// broken, so the pool closes them instead of reusing them.
pub(crate) struct BindManager {
    bind_name: String,
    mode: &'static str,
    inner: SqliteConnectionManager,
}

impl BindManager {
    pub(crate) fn new(bind_name: &str, target: &ConnectTarget) -> Self {
        let (mode, inner) = match target {
            ConnectTarget::File(path) => ("file", SqliteConnectionManager::file(path)),
            ConnectTarget::Memory => ("memory", SqliteConnectionManager::memory()),
        };
        Self {
            bind_name: bind_name.to_string(),
            mode,
            inner,
        }
    }
}

impl ManageConnection for BindManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let started_at = Instant::now();
        let conn = self.inner.connect()?;
        info!(
            "event=db_connect module=engine status=ok bind={} mode={} duration_ms={}",
            self.bind_name,
            self.mode,
            started_at.elapsed().as_millis()
        );
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        self.inner.is_valid(conn)
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        !conn.is_autocommit()
    }
}

/// Applies the bind's pragmas when the pool opens a connection.
#[derive(Debug)]
pub(crate) struct BindPragmas {
    bind_name: String,
    busy_timeout: Duration,
    journal_mode: String,
}

impl BindPragmas {
    pub(crate) fn new(bind_name: &str, config: &BindConfig) -> Self {
        Self {
            bind_name: bind_name.to_string(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            journal_mode: config.journal_mode.to_ascii_lowercase(),
        }
    }

    fn configure(&self, conn: &mut Connection) -> rusqlite::Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", &self.journal_mode, |row| {
            row.get::<_, String>(0)
        })?;
        Ok(())
    }
}

impl CustomizeConnection<Connection, rusqlite::Error> for BindPragmas {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        let result = self.configure(conn);
        if let Err(err) = &result {
            error!(
                "event=db_configure module=engine status=error bind={} error_code=db_configure_failed error={}",
                self.bind_name, err
            );
        }
        result
    }
}

/// Routes pool-side connection failures into the structured log.
#[derive(Debug)]
pub(crate) struct ConnectErrorLog {
    bind_name: String,
}

impl ConnectErrorLog {
    pub(crate) fn new(bind_name: &str) -> Self {
        Self {
            bind_name: bind_name.to_string(),
        }
    }
}

impl HandleError<rusqlite::Error> for ConnectErrorLog {
    fn handle_error(&self, err: rusqlite::Error) {
        error!(
            "event=db_connect module=engine status=error bind={} error_code=db_open_failed error={}",
            self.bind_name, err
        );
    }
}
