use super::guards::{Savepoint, Subtransaction};
use super::statement::{ExecuteOptions, ExecuteResult, Statement};
use crate::config::SessionDefaults;
use crate::engine::{Engine, EngineConnection, EngineRegistry, WriteOwner};
use crate::entity::{Entity, EntityKey, EntityRecord};
use crate::error::{StoreError, StoreResult};
use crate::scope::ScopeToken;
use crate::sql::{ensure_transient, TableNameExtractor};
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Sessions are shared between the registry and the code using them.
pub type SessionHandle = Arc<Session>;

/// Per-session behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Forget flushed rows after commit.
    pub expire_on_commit: bool,
    /// Flush staged writes before every `execute`.
    pub autoflush: bool,
}

impl SessionOptions {
    /// Defaults for atomic and transient sessions.
    pub fn atomic() -> Self {
        Self {
            expire_on_commit: false,
            autoflush: true,
        }
    }

    pub fn with_expire_on_commit(mut self, expire_on_commit: bool) -> Self {
        self.expire_on_commit = expire_on_commit;
        self
    }

    pub fn with_autoflush(mut self, autoflush: bool) -> Self {
        self.autoflush = autoflush;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionDefaults::default().into()
    }
}

impl From<SessionDefaults> for SessionOptions {
    fn from(defaults: SessionDefaults) -> Self {
        Self {
            expire_on_commit: defaults.expire_on_commit,
            autoflush: defaults.autoflush,
        }
    }
}

/// A transactional unit of work against one or more engines.
pub struct Session {
    id: Uuid,
    is_atomic: bool,
    options: SessionOptions,
    engines: Arc<EngineRegistry>,
    extractor: Arc<dyn TableNameExtractor>,
    state: Mutex<SessionState>,
}

struct SessionState {
    owner: WriteOwner,
    connections: Vec<BoundConnection>,
    pending: Vec<PendingWrite>,
    identity: Vec<EntityRecord>,
    savepoints: Vec<SavepointFrame>,
    subtransactions: usize,
    inactive: bool,
    next_savepoint: u64,
}

struct BoundConnection {
    engine: Arc<Engine>,
    conn: EngineConnection,
}

struct PendingWrite {
    engine: Arc<Engine>,
    entity: EntityKey,
    values: Vec<(&'static str, Value)>,
}

struct SavepointFrame {
    name: String,
    identity_mark: usize,
}

impl Session {
    pub(crate) fn new(
        engines: Arc<EngineRegistry>,
        extractor: Arc<dyn TableNameExtractor>,
        is_atomic: bool,
        options: SessionOptions,
        scope: Option<ScopeToken>,
    ) -> Self {
        let id = Uuid::new_v4();
        let session = Self {
            id,
            is_atomic,
            options,
            engines,
            extractor,
            state: Mutex::new(SessionState::new(WriteOwner { session: id, scope })),
        };
        debug!(
            "event=session_open module=session status=ok session={} atomic={} scope={}",
            session.id,
            is_atomic,
            scope.map_or_else(|| "none".to_string(), |scope| scope.to_string())
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// True for sessions created as independent transactions.
    pub fn is_atomic(&self) -> bool {
        self.is_atomic
    }

    /// Sessions never autocommit.
    pub fn autocommit(&self) -> bool {
        false
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// False after a subtransaction rolled back, until [`Session::rollback`].
    pub fn is_active(&self) -> bool {
        !self.lock_state().inactive
    }

    /// True while at least one connection holds an open transaction.
    pub fn in_transaction(&self) -> bool {
        !self.lock_state().connections.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Rows flushed in the current transaction, oldest first.
    pub fn identity(&self) -> Vec<EntityRecord> {
        self.lock_state().identity.clone()
    }

    /// Stages `entity` for insertion on the next flush.
    pub fn add<E: Entity>(&self, entity: &E) -> StoreResult<()> {
        let key = EntityKey::of::<E>();
        let engine = self
            .engines
            .entity_engine(&key)
            .unwrap_or_else(|| Arc::clone(self.engines.default_engine()));

        let mut state = self.lock_state();
        state.ensure_active()?;
        state.pending.push(PendingWrite {
            engine,
            entity: key,
            values: entity.values(),
        });
        Ok(())
    }

    /// Writes staged entities inside the session transaction.
    pub fn flush(&self) -> StoreResult<()> {
        let mut state = self.lock_state();
        state.ensure_active()?;
        state.flush()
    }

    /// Runs `statement` on the engine chosen by [`Session::get_bind`].
    ///
    /// With `options.transient`, raw text containing a non-transient keyword
    /// is rejected before any connection is touched. A writing statement
    /// fails with [`StoreError::WriteConflict`] while another session of the
    /// same scope holds the bind's write lock.
    pub fn execute(
        &self,
        statement: impl Into<Statement>,
        options: ExecuteOptions,
    ) -> StoreResult<ExecuteResult> {
        let statement = statement.into();
        if options.transient && statement.is_raw() {
            ensure_transient(statement.sql())?;
        }
        let engine = self.get_bind(options.bind_name.as_deref(), &statement)?;

        let mut state = self.lock_state();
        state.ensure_active()?;
        if self.options.autoflush {
            state.flush()?;
        }
        state.run(&engine, &statement)
    }

    /// Resolves the engine for `statement`.
    ///
    /// Order: explicit bind name, the statement's entity bind, the first
    /// mapped table in raw text, the default bind.
    pub fn get_bind(
        &self,
        bind_name: Option<&str>,
        statement: &Statement,
    ) -> StoreResult<Arc<Engine>> {
        if let Some(bind_name) = bind_name {
            return self.engines.bind_engine(bind_name);
        }
        match statement.entity() {
            Some(entity) => {
                if let Some(engine) = self.engines.entity_engine(entity) {
                    return Ok(engine);
                }
            }
            None => {
                let tables = self.extractor.find_table_names(statement.sql());
                if let Some(engine) = tables
                    .iter()
                    .find_map(|table| self.engines.table_engine(table))
                {
                    return Ok(engine);
                }
            }
        }
        Ok(Arc::clone(self.engines.default_engine()))
    }

    /// Flushes and commits every open connection, then releases them.
    pub fn commit(&self) -> StoreResult<()> {
        let mut state = self.lock_state();
        state.ensure_active()?;
        state.flush()?;

        for bound in &state.connections {
            if !bound.conn.is_autocommit() {
                bound
                    .conn
                    .execute_batch("COMMIT")
                    .map_err(|err| StoreError::sqlite(bound.engine.bind_name(), err))?;
            }
        }

        let engines = state.connections.len();
        state.savepoints.clear();
        state.subtransactions = 0;
        if self.options.expire_on_commit {
            state.identity.clear();
        }
        state.release_connections();
        info!(
            "event=session_commit module=session status=ok session={} atomic={} engines={}",
            self.id, self.is_atomic, engines
        );
        Ok(())
    }

    /// Discards staged writes and rolls back every open connection.
    ///
    /// Also reactivates a session deactivated by a subtransaction rollback.
    /// Connections are released even when a rollback fails.
    pub fn rollback(&self) -> StoreResult<()> {
        let result = self.lock_state().rollback_all();
        match &result {
            Ok(()) => info!(
                "event=session_rollback module=session status=ok session={} atomic={}",
                self.id, self.is_atomic
            ),
            Err(err) => error!(
                "event=session_rollback module=session status=error session={} error={}",
                self.id, err
            ),
        }
        result
    }

    /// Rolls back and releases everything the session holds.
    pub fn close(&self) {
        let mut state = self.lock_state();
        if let Err(err) = state.rollback_all() {
            error!(
                "event=session_close module=session status=error session={} error={}",
                self.id, err
            );
        }
        debug!(
            "event=session_close module=session status=ok session={}",
            self.id
        );
    }

    /// Opens a savepoint on every connection, including ones opened later.
    pub fn begin_nested(&self) -> StoreResult<Savepoint<'_>> {
        let mut state = self.lock_state();
        state.ensure_active()?;
        state.flush()?;

        state.next_savepoint += 1;
        let name = format!("sp_{}", state.next_savepoint);
        let sql = format!("SAVEPOINT {name}");
        for (index, bound) in state.connections.iter().enumerate() {
            if let Err(err) = bound.conn.execute_batch(&sql) {
                for opened in &state.connections[..index] {
                    let _ = opened.conn.execute_batch(&format!("RELEASE SAVEPOINT {name}"));
                }
                return Err(StoreError::sqlite(bound.engine.bind_name(), err));
            }
        }
        let identity_mark = state.identity.len();
        state.savepoints.push(SavepointFrame {
            name: name.clone(),
            identity_mark,
        });
        debug!(
            "event=savepoint_begin module=session status=ok session={} savepoint={}",
            self.id, name
        );
        Ok(Savepoint::new(self, name))
    }

    /// Opens a logical sub-boundary on the current transaction.
    pub fn begin_subtransaction(&self) -> StoreResult<Subtransaction<'_>> {
        let mut state = self.lock_state();
        state.ensure_active()?;
        state.subtransactions += 1;
        debug!(
            "event=subtransaction_begin module=session status=ok session={} depth={}",
            self.id, state.subtransactions
        );
        Ok(Subtransaction::new(self))
    }

    pub(crate) fn release_savepoint(&self, name: &str) -> StoreResult<()> {
        let mut state = self.lock_state();
        state.ensure_active()?;
        if state.savepoints.last().map(|frame| frame.name.as_str()) != Some(name) {
            return Err(StoreError::SavepointOrder {
                name: name.to_string(),
            });
        }
        state.flush()?;

        let sql = format!("RELEASE SAVEPOINT {name}");
        for bound in &state.connections {
            bound
                .conn
                .execute_batch(&sql)
                .map_err(|err| StoreError::sqlite(bound.engine.bind_name(), err))?;
        }
        state.savepoints.pop();
        debug!(
            "event=savepoint_release module=session status=ok session={} savepoint={}",
            self.id, name
        );
        Ok(())
    }

    pub(crate) fn rollback_to_savepoint(&self, name: &str) -> StoreResult<()> {
        let mut state = self.lock_state();
        let Some(position) = state.savepoints.iter().position(|frame| frame.name == name) else {
            // The enclosing transaction already ended and took the savepoint with it.
            warn!(
                "event=savepoint_rollback module=session status=skipped session={} savepoint={} reason=transaction_ended",
                self.id, name
            );
            return Ok(());
        };
        if position + 1 != state.savepoints.len() {
            return Err(StoreError::SavepointOrder {
                name: name.to_string(),
            });
        }

        state.pending.clear();
        let sql = format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};");
        for bound in &state.connections {
            bound
                .conn
                .execute_batch(&sql)
                .map_err(|err| StoreError::sqlite(bound.engine.bind_name(), err))?;
        }
        if let Some(frame) = state.savepoints.pop() {
            state.identity.truncate(frame.identity_mark);
        }
        info!(
            "event=savepoint_rollback module=session status=ok session={} savepoint={}",
            self.id, name
        );
        Ok(())
    }

    pub(crate) fn end_subtransaction(&self) -> StoreResult<()> {
        let mut state = self.lock_state();
        state.subtransactions = state.subtransactions.saturating_sub(1);
        state.ensure_active()
    }

    /// Rolls back the real transaction and leaves the session inactive.
    pub(crate) fn rollback_subtransaction(&self) -> StoreResult<()> {
        let mut state = self.lock_state();
        let depth = state.subtransactions;
        let result = state.rollback_all();
        state.subtransactions = depth.saturating_sub(1);
        state.inactive = true;
        warn!(
            "event=subtransaction_rollback module=session status=ok session={} depth={} parent=inactive",
            self.id, depth
        );
        result
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionState {
    fn new(owner: WriteOwner) -> Self {
        Self {
            owner,
            connections: Vec::new(),
            pending: Vec::new(),
            identity: Vec::new(),
            savepoints: Vec::new(),
            subtransactions: 0,
            inactive: false,
            next_savepoint: 0,
        }
    }

    fn ensure_active(&self) -> StoreResult<()> {
        if self.inactive {
            Err(StoreError::InactiveTransaction)
        } else {
            Ok(())
        }
    }

    /// Connection for `engine`, checked out and begun on first use.
    fn connection(&mut self, engine: &Arc<Engine>) -> StoreResult<&Connection> {
        let position = match self
            .connections
            .iter()
            .position(|bound| Arc::ptr_eq(&bound.engine, engine))
        {
            Some(position) => position,
            None => {
                let conn = engine.checkout()?;
                begin(&conn, &self.savepoints)
                    .map_err(|err| StoreError::sqlite(engine.bind_name(), err))?;
                self.connections.push(BoundConnection {
                    engine: Arc::clone(engine),
                    conn,
                });
                self.connections.len() - 1
            }
        };
        Ok(&*self.connections[position].conn)
    }

    /// Runs one statement, claiming the bind's write lock when it writes.
    fn run(&mut self, engine: &Arc<Engine>, statement: &Statement) -> StoreResult<ExecuteResult> {
        let owner = self.owner;
        let bind_name = engine.bind_name();
        let conn = self.connection(engine)?;
        let mut prepared = conn
            .prepare(statement.sql())
            .map_err(|err| StoreError::sqlite(bind_name, err))?;
        let writes = !prepared.readonly();
        if writes {
            engine.check_write(&owner)?;
        }
        let result = run_statement(&mut prepared, bind_name, statement)
            .map_err(|err| StoreError::sqlite(bind_name, err))?;
        if writes {
            engine.record_write(&owner);
        }
        Ok(result)
    }

    /// Inserts staged writes in order; unwritten ones stay staged on failure.
    fn flush(&mut self) -> StoreResult<()> {
        let mut writes = std::mem::take(&mut self.pending).into_iter();
        while let Some(write) = writes.next() {
            match self.insert(&write) {
                Ok(rowid) => self.identity.push(EntityRecord {
                    entity: write.entity,
                    bind_name: write.engine.bind_name().to_string(),
                    rowid,
                }),
                Err(err) => {
                    self.pending.push(write);
                    self.pending.extend(writes);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, write: &PendingWrite) -> StoreResult<i64> {
        let sql = insert_sql(write.entity.table(), &write.values);
        let bind_name = write.engine.bind_name();
        let owner = self.owner;
        write.engine.check_write(&owner)?;
        let conn = self.connection(&write.engine)?;
        conn.execute(&sql, params_from_iter(write.values.iter().map(|(_, value)| value)))
            .map_err(|err| StoreError::sqlite(bind_name, err))?;
        let rowid = conn.last_insert_rowid();
        write.engine.record_write(&owner);
        Ok(rowid)
    }

    fn rollback_all(&mut self) -> StoreResult<()> {
        self.pending.clear();
        let session = self.owner.session;
        let mut first_error = None;
        for bound in self.connections.drain(..) {
            if !bound.conn.is_autocommit() {
                if let Err(err) = bound.conn.execute_batch("ROLLBACK") {
                    first_error.get_or_insert(StoreError::sqlite(bound.engine.bind_name(), err));
                }
            }
            bound.engine.release_write(session);
        }
        self.savepoints.clear();
        self.identity.clear();
        self.subtransactions = 0;
        self.inactive = false;
        first_error.map_or(Ok(()), Err)
    }

    fn release_connections(&mut self) {
        let session = self.owner.session;
        for bound in self.connections.drain(..) {
            bound.engine.release_write(session);
        }
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("is_atomic", &self.is_atomic)
            .field("options", &self.options)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.connections.is_empty() && state.pending.is_empty() {
            return;
        }
        warn!(
            "event=session_drop module=session status=rollback session={} engines={} pending={}",
            self.id,
            state.connections.len(),
            state.pending.len()
        );
        if let Err(err) = state.rollback_all() {
            error!(
                "event=session_drop module=session status=error session={} error={}",
                self.id, err
            );
        }
    }
}

/// Starts a deferred transaction and replays the session's open savepoints.
fn begin(conn: &Connection, savepoints: &[SavepointFrame]) -> rusqlite::Result<()> {
    conn.execute_batch("BEGIN DEFERRED")?;
    for frame in savepoints {
        conn.execute_batch(&format!("SAVEPOINT {}", frame.name))?;
    }
    Ok(())
}

fn run_statement(
    prepared: &mut rusqlite::Statement<'_>,
    bind_name: &str,
    statement: &Statement,
) -> rusqlite::Result<ExecuteResult> {
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    if columns.is_empty() {
        let rows_affected = prepared.execute(params_from_iter(statement.params().iter()))?;
        return Ok(ExecuteResult {
            bind_name: bind_name.to_string(),
            columns,
            rows: Vec::new(),
            rows_affected,
        });
    }

    let mut rows = prepared.query(params_from_iter(statement.params().iter()))?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(row.get::<_, Value>(index)?);
        }
        collected.push(values);
    }
    Ok(ExecuteResult {
        bind_name: bind_name.to_string(),
        columns,
        rows: collected,
        rows_affected: 0,
    })
}

fn insert_sql(table: &str, values: &[(&'static str, Value)]) -> String {
    if values.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table));
    }
    let columns = values
        .iter()
        .map(|(column, _)| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=values.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_identifier(table)
    )
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::{insert_sql, Session, SessionOptions};
    use crate::config::DatabaseConfig;
    use crate::engine::EngineRegistryBuilder;
    use crate::entity::Entity;
    use crate::error::StoreError;
    use crate::scope::ScopeToken;
    use crate::session::ExecuteOptions;
    use crate::sql::RegexTableExtractor;
    use rusqlite::types::Value;
    use std::sync::Arc;

    struct Note {
        title: &'static str,
    }

    impl Entity for Note {
        const TABLE: &'static str = "notes";

        fn values(&self) -> Vec<(&'static str, Value)> {
            vec![("title", Value::Text(self.title.to_string()))]
        }
    }

    fn session(dir: &tempfile::TempDir, options: SessionOptions) -> Session {
        let url = dir.path().join("session.db").display().to_string();
        let registry = EngineRegistryBuilder::new(DatabaseConfig::new(url))
            .build()
            .unwrap();
        let setup = Session::new(
            Arc::new(registry),
            Arc::new(RegexTableExtractor),
            false,
            options,
            None,
        );
        setup
            .execute(
                "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, title TEXT NOT NULL)",
                ExecuteOptions::default(),
            )
            .unwrap();
        setup.commit().unwrap();
        setup
    }

    fn count_notes(session: &Session) -> i64 {
        session
            .execute("SELECT COUNT(*) FROM notes", ExecuteOptions::default())
            .unwrap()
            .scalar_i64()
            .unwrap()
    }

    #[test]
    fn insert_sql_quotes_identifiers() {
        let sql = insert_sql("notes", &[("title", Value::Null), ("body", Value::Null)]);
        assert_eq!(sql, "INSERT INTO \"notes\" (\"title\", \"body\") VALUES (?1, ?2)");
        assert_eq!(insert_sql("t", &[]), "INSERT INTO \"t\" DEFAULT VALUES");
    }

    #[test]
    fn staged_writes_flush_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, SessionOptions::atomic());

        session.add(&Note { title: "a" }).unwrap();
        assert_eq!(session.pending_count(), 1);
        session.commit().unwrap();

        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.identity().len(), 1);
        assert_eq!(count_notes(&session), 1);
        session.rollback().unwrap();
    }

    #[test]
    fn expire_on_commit_clears_identity() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, SessionOptions::default());

        session.add(&Note { title: "a" }).unwrap();
        session.commit().unwrap();
        assert!(session.identity().is_empty());
        assert!(!session.in_transaction());
    }

    #[test]
    fn savepoint_rollback_keeps_outer_writes() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, SessionOptions::atomic());

        session.add(&Note { title: "outer" }).unwrap();
        let savepoint = session.begin_nested().unwrap();
        session.add(&Note { title: "inner" }).unwrap();
        savepoint.rollback().unwrap();
        session.commit().unwrap();

        let identity = session.identity();
        assert_eq!(identity.len(), 1);
        assert_eq!(count_notes(&session), 1);
        session.rollback().unwrap();
    }

    #[test]
    fn subtransaction_rollback_deactivates_session() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, SessionOptions::default());

        session.add(&Note { title: "root" }).unwrap();
        let sub = session.begin_subtransaction().unwrap();
        sub.rollback().unwrap();

        assert!(!session.is_active());
        assert!(matches!(
            session.commit().unwrap_err(),
            StoreError::InactiveTransaction
        ));
        session.rollback().unwrap();
        assert!(session.is_active());
        assert_eq!(count_notes(&session), 0);
        session.rollback().unwrap();
    }

    #[test]
    fn sessions_of_one_scope_fail_fast_on_a_held_write_lock() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let setup = session(&dir, SessionOptions::default());
        let engines = Arc::clone(&setup.engines);
        let scope = Some(ScopeToken::Thread(std::thread::current().id()));
        let open = |is_atomic| {
            Session::new(
                Arc::clone(&engines),
                Arc::new(RegexTableExtractor),
                is_atomic,
                SessionOptions::atomic(),
                scope,
            )
        };
        let holder = open(false);
        let other = open(true);

        holder.add(&Note { title: "held" }).unwrap();
        holder.flush().expect("first writer should flush");
        assert_eq!(engines.default_engine().writer(), Some(holder.id()));

        assert_eq!(count_notes(&other), 0);
        other.add(&Note { title: "blocked" }).unwrap();
        match other.flush().unwrap_err() {
            StoreError::WriteConflict { bind_name, holder: id } => {
                assert_eq!(bind_name, "default");
                assert_eq!(id, holder.id());
            }
            err => panic!("unexpected error: {err}"),
        }
        assert_eq!(other.pending_count(), 1);
        assert!(matches!(
            other
                .execute("DELETE FROM notes", ExecuteOptions::default())
                .unwrap_err(),
            StoreError::WriteConflict { .. }
        ));
        other.rollback().expect("rollback should release the reader");

        holder.commit().expect("holder should commit");
        assert_eq!(engines.default_engine().writer(), None);
        other.add(&Note { title: "after" }).unwrap();
        other.commit().expect("freed bind should accept the write");
        assert_eq!(count_notes(&other), 2);
        other.rollback().unwrap();
    }

    #[test]
    fn dropping_a_session_returns_its_connection() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir, SessionOptions::default());
        let engines = Arc::clone(&session.engines);

        session.add(&Note { title: "lost" }).unwrap();
        session.flush().unwrap();
        assert_eq!(engines.default_engine().stats().checked_out, 1);
        drop(session);

        assert_eq!(engines.default_engine().stats().checked_out, 0);
    }
}
