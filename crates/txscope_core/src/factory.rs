//! Session factory: scoped shared sessions and independent atomic sessions.
//!
//! # Responsibility
//! - Pick the registry for the caller: request-scoped while the request
//!   context reports an active request, thread-scoped otherwise.
//! - Create shared sessions lazily (once per scope) and atomic sessions on
//!   demand.
//!
//! # Invariants
//! - `get_atomic_store` never touches a registry; pushing is left to the
//!   transaction boundaries.
//! - `remove` never leaves a popped session holding connections.

use crate::engine::EngineRegistry;
use crate::error::{StoreError, StoreResult};
use crate::registry::{RequestScopedRegistry, ScopeRegistry, ThreadScopedRegistry};
use crate::scope::{RequestContextProvider, ScopeToken};
use crate::session::{Session, SessionHandle, SessionOptions};
use crate::sql::TableNameExtractor;
use log::{debug, warn};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub struct SessionFactory {
    engines: Arc<EngineRegistry>,
    extractor: Arc<dyn TableNameExtractor>,
    defaults: SessionOptions,
    thread_registry: ThreadScopedRegistry,
    request_registry: RequestScopedRegistry,
}

impl SessionFactory {
    pub fn new(
        engines: Arc<EngineRegistry>,
        extractor: Arc<dyn TableNameExtractor>,
        context: Arc<dyn RequestContextProvider>,
        defaults: SessionOptions,
    ) -> Self {
        Self {
            engines,
            extractor,
            defaults,
            thread_registry: ThreadScopedRegistry::new(),
            request_registry: RequestScopedRegistry::new(context),
        }
    }

    pub fn engines(&self) -> &Arc<EngineRegistry> {
        &self.engines
    }

    /// Options used for shared sessions created without explicit options.
    pub fn defaults(&self) -> SessionOptions {
        self.defaults
    }

    /// Registry serving the calling code.
    pub fn registry(&self) -> &dyn ScopeRegistry {
        if self.request_registry.is_active() {
            &self.request_registry
        } else {
            &self.thread_registry
        }
    }

    pub fn current_scope(&self) -> StoreResult<ScopeToken> {
        Ok(self.registry().scope()?)
    }

    /// Innermost atomic session of the scope, else the scope's shared session.
    pub fn get_current_store(&self) -> StoreResult<SessionHandle> {
        let registry = self.registry();
        if let Some(atomic) = registry.get()? {
            return Ok(atomic);
        }
        let defaults = self.defaults;
        Ok(registry.shared_or_insert_with(&mut || self.new_session(false, defaults))?)
    }

    /// Creates the scope's shared session with `options`.
    ///
    /// Fails with [`StoreError::SessionAlreadyPresent`] when the scope already
    /// holds a shared or atomic session.
    pub fn get_current_store_with(&self, options: SessionOptions) -> StoreResult<SessionHandle> {
        let registry = self.registry();
        if registry.has()? || registry.shared()?.is_some() {
            return Err(StoreError::SessionAlreadyPresent);
        }
        Ok(registry.shared_or_insert_with(&mut || self.new_session(false, options))?)
    }

    /// A new independent session; the caller decides when it becomes current.
    pub fn get_atomic_store(&self, options: SessionOptions) -> SessionHandle {
        self.new_session(true, options)
    }

    /// Shared session of the scope, if one was created.
    pub fn shared_store(&self) -> StoreResult<Option<SessionHandle>> {
        Ok(self.registry().shared()?)
    }

    pub fn current_atomic(&self) -> StoreResult<Option<SessionHandle>> {
        Ok(self.registry().get()?)
    }

    /// Atomic stack of the scope, outermost first.
    pub fn atomic_stack(&self) -> StoreResult<Vec<SessionHandle>> {
        Ok(self.registry().get_all()?)
    }

    pub fn push_atomic(&self, session: SessionHandle) -> StoreResult<()> {
        let registry = self.registry();
        registry.set(Arc::clone(&session))?;
        debug!(
            "event=atomic_push module=factory status=ok session={} scope={}",
            session.id(),
            registry.scope()?
        );
        Ok(())
    }

    /// Pops the top atomic frame, expecting it to be `expected`.
    pub(crate) fn pop_atomic(&self, expected: &SessionHandle) -> StoreResult<()> {
        let popped = self.registry().clear(true)?;
        for session in popped {
            if !Arc::ptr_eq(&session, expected) {
                warn!(
                    "event=atomic_pop module=factory status=degraded expected={} popped={} reason=stack_order",
                    expected.id(),
                    session.id()
                );
            }
            session.close();
            debug!(
                "event=atomic_pop module=factory status=ok session={}",
                session.id()
            );
        }
        Ok(())
    }

    /// Disposes of the scope's top atomic session (`atomic`), or of its whole
    /// atomic stack and shared session. Missing sessions are a no-op.
    pub fn remove(&self, atomic: bool) -> StoreResult<()> {
        let registry = self.registry();
        let mut removed = registry.clear(atomic)?;
        if !atomic {
            removed.extend(registry.take_shared()?);
        }
        for session in &removed {
            session.close();
        }
        debug!(
            "event=session_remove module=factory status=ok atomic={} removed={}",
            atomic,
            removed.len()
        );
        Ok(())
    }

    /// Commits the current atomic session and, unless `atomic`, the shared one.
    pub fn commit_all(&self, atomic: bool) -> StoreResult<()> {
        let registry = self.registry();
        if let Some(session) = registry.get()? {
            session.commit()?;
        }
        if !atomic {
            if let Some(shared) = registry.shared()? {
                shared.commit()?;
            }
        }
        Ok(())
    }

    /// Rolls back like [`SessionFactory::commit_all`] commits; every session
    /// is rolled back even when an earlier one fails.
    pub fn rollback_all(&self, atomic: bool) -> StoreResult<()> {
        let registry = self.registry();
        let mut result = match registry.get()? {
            Some(session) => session.rollback(),
            None => Ok(()),
        };
        if !atomic {
            if let Some(shared) = registry.shared()? {
                let shared_result = shared.rollback();
                if result.is_ok() {
                    result = shared_result;
                }
            }
        }
        result
    }

    /// Scopes holding sessions: all request scopes plus the caller's thread.
    pub fn active_scopes(&self) -> usize {
        self.request_registry.active_scopes() + self.thread_registry.active_scopes()
    }

    fn new_session(&self, is_atomic: bool, options: SessionOptions) -> SessionHandle {
        Arc::new(Session::new(
            Arc::clone(&self.engines),
            Arc::clone(&self.extractor),
            is_atomic,
            options,
            self.registry().scope().ok(),
        ))
    }
}

impl Debug for SessionFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("engines", &self.engines)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
