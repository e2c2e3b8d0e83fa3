//! Engine: one bind's database plus its bounded connection pool.
//!
//! # Responsibility
//! - Hand out configured connections to sessions.
//! - Track which session holds the bind's write lock, so sessions of one
//!   scope fail fast instead of waiting on each other.
//!
//! # Invariants
//! - At most `pool_size + max_overflow` connections exist at once; further
//!   checkouts block up to `pool_timeout_ms`.
//! - A connection is never pooled while a transaction is open on it.
//! - `pool_size` connections are kept open while idle.

use super::open::{BindManager, BindPragmas, ConnectErrorLog};
use crate::config::{BindConfig, ConnectTarget};
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::scope::ScopeToken;
use log::{debug, error, warn};
use r2d2::{Pool, PooledConnection};
use rusqlite::Connection;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A physical database handle bound to one bind name.
pub struct Engine {
    bind_name: String,
    config: BindConfig,
    shared_file: bool,
    pool: Pool<BindManager>,
    writer: Mutex<Option<WriteOwner>>,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub checked_out: usize,
    pub max_connections: usize,
}

/// The session a write is issued for, and the scope that session lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WriteOwner {
    pub session: Uuid,
    pub scope: Option<ScopeToken>,
}

/// A pooled connection; an open transaction is rolled back on drop.
pub struct EngineConnection {
    bind_name: String,
    conn: PooledConnection<BindManager>,
}

impl Deref for EngineConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for EngineConnection {
    fn drop(&mut self) {
        if self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            error!(
                "event=pool_checkin module=engine status=error bind={} error_code=reset_failed error={}",
                self.bind_name, err
            );
        }
    }
}

impl Engine {
    pub(crate) fn new(bind_name: &str, config: BindConfig) -> StoreResult<Self> {
        let invalid = |reason: String| ConfigError::InvalidBind {
            bind_name: bind_name.to_string(),
            reason,
        };
        let target = config.target().map_err(invalid)?;
        let max_size = u32::try_from(config.max_connections())
            .map_err(|_| invalid("pool_size + max_overflow is too large".to_string()))?;
        let min_idle = u32::try_from(config.pool_size)
            .map_err(|_| invalid("pool_size is too large".to_string()))?;
        if target == ConnectTarget::Memory {
            warn!(
                "event=engine_init module=engine status=degraded bind={} reason=memory_database_per_connection",
                bind_name
            );
        }

        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(min_idle))
            .connection_timeout(Duration::from_millis(config.pool_timeout_ms))
            .connection_customizer(Box::new(BindPragmas::new(bind_name, &config)))
            .error_handler(Box::new(ConnectErrorLog::new(bind_name)))
            .build(BindManager::new(bind_name, &target))
            .map_err(|source| StoreError::Pool {
                bind_name: bind_name.to_string(),
                source,
            })?;

        Ok(Self {
            bind_name: bind_name.to_string(),
            config,
            shared_file: matches!(target, ConnectTarget::File(_)),
            pool,
            writer: Mutex::new(None),
        })
    }

    pub fn bind_name(&self) -> &str {
        &self.bind_name
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            idle: state.idle_connections as usize,
            checked_out: state.connections.saturating_sub(state.idle_connections) as usize,
            max_connections: self.config.max_connections(),
        }
    }

    /// Takes a connection from the pool.
    ///
    /// Blocks while the pool is exhausted, failing with
    /// [`StoreError::PoolTimeout`] after `pool_timeout_ms`.
    pub fn checkout(&self) -> StoreResult<EngineConnection> {
        let started_at = Instant::now();
        match self.pool.get() {
            Ok(conn) => {
                debug!(
                    "event=pool_checkout module=engine status=ok bind={} duration_ms={}",
                    self.bind_name,
                    started_at.elapsed().as_millis()
                );
                Ok(EngineConnection {
                    bind_name: self.bind_name.clone(),
                    conn,
                })
            }
            Err(err) => {
                let waited_ms = started_at.elapsed().as_millis();
                error!(
                    "event=pool_checkout module=engine status=error bind={} error_code=pool_timeout waited_ms={} error={}",
                    self.bind_name, waited_ms, err
                );
                Err(StoreError::PoolTimeout {
                    bind_name: self.bind_name.clone(),
                    waited_ms,
                })
            }
        }
    }

    /// Session currently holding this bind's write lock, if known.
    pub fn writer(&self) -> Option<Uuid> {
        self.lock_writer().map(|owner| owner.session)
    }

    /// Fails when another session of `owner`'s scope holds the write lock.
    ///
    /// SQLite admits one writer per file; waiting on a session of the same
    /// scope would only end with the busy timeout.
    pub(crate) fn check_write(&self, owner: &WriteOwner) -> StoreResult<()> {
        if !self.shared_file {
            return Ok(());
        }
        let Some(holder) = *self.lock_writer() else {
            return Ok(());
        };
        if holder.session == owner.session || owner.scope.is_none() || holder.scope != owner.scope
        {
            return Ok(());
        }
        warn!(
            "event=write_conflict module=engine status=rejected bind={} session={} holder={}",
            self.bind_name, owner.session, holder.session
        );
        Err(StoreError::WriteConflict {
            bind_name: self.bind_name.clone(),
            holder: holder.session,
        })
    }

    /// Records `owner` as the write-lock holder after a successful write.
    pub(crate) fn record_write(&self, owner: &WriteOwner) {
        if self.shared_file {
            *self.lock_writer() = Some(*owner);
        }
    }

    /// Forgets `session` as the write-lock holder once its transaction ended.
    pub(crate) fn release_write(&self, session: Uuid) {
        let mut writer = self.lock_writer();
        if writer.is_some_and(|owner| owner.session == session) {
            *writer = None;
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, Option<WriteOwner>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("bind_name", &self.bind_name)
            .field("url", &self.config.url)
            .finish()
    }
}
