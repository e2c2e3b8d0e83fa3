//! Per-scope session state: the shared session and the atomic stack.
//!
//! # Responsibility
//! - Keep one [`ScopeEntry`] per live scope token.
//! - Provide stack operations on the atomic sessions of the current scope.
//!
//! # Invariants
//! - Push/pop order within one scope is strict LIFO.
//! - Entries holding no session are removed, never kept around empty.
//! - Operations on a scope without an entry behave as on an empty entry.

mod request_scoped;
mod shards;
mod thread_scoped;

pub use request_scoped::RequestScopedRegistry;
pub use thread_scoped::ThreadScopedRegistry;

use crate::error::ScopeError;
use crate::scope::ScopeToken;
use crate::session::SessionHandle;
use std::sync::Arc;

/// Sessions owned by one scope token.
#[derive(Debug, Default)]
pub struct ScopeEntry {
    shared: Option<SessionHandle>,
    atomic: Vec<SessionHandle>,
}

impl ScopeEntry {
    pub fn is_empty(&self) -> bool {
        self.shared.is_none() && self.atomic.is_empty()
    }
}

/// Scope-keyed session storage.
///
/// Implementations only provide scope resolution and exclusive access to the
/// current scope's entry; the stack contract is shared.
pub trait ScopeRegistry: Send + Sync {
    /// Token of the scope the calling code runs in.
    fn scope(&self) -> Result<ScopeToken, ScopeError>;

    /// Runs `visit` on the current scope's entry, creating it on demand and
    /// removing it again when `visit` leaves it empty.
    fn with_entry(&self, visit: &mut dyn FnMut(&mut ScopeEntry)) -> Result<(), ScopeError>;

    /// Number of scopes currently holding sessions.
    fn active_scopes(&self) -> usize;

    fn has(&self) -> Result<bool, ScopeError> {
        let mut has = false;
        self.with_entry(&mut |entry| has = !entry.atomic.is_empty())?;
        Ok(has)
    }

    /// Pushes `session` onto the current scope's atomic stack.
    fn set(&self, session: SessionHandle) -> Result<(), ScopeError> {
        let mut session = Some(session);
        self.with_entry(&mut |entry| entry.atomic.extend(session.take()))
    }

    /// Innermost atomic session of the current scope.
    fn get(&self) -> Result<Option<SessionHandle>, ScopeError> {
        let mut top = None;
        self.with_entry(&mut |entry| top = entry.atomic.last().cloned())?;
        Ok(top)
    }

    /// The whole atomic stack, outermost first.
    fn get_all(&self) -> Result<Vec<SessionHandle>, ScopeError> {
        let mut all = Vec::new();
        self.with_entry(&mut |entry| all = entry.atomic.clone())?;
        Ok(all)
    }

    /// Pops the top frame (`atomic`) or the whole stack, returning what was
    /// removed so callers can dispose of it outside the registry.
    fn clear(&self, atomic: bool) -> Result<Vec<SessionHandle>, ScopeError> {
        let mut removed = Vec::new();
        self.with_entry(&mut |entry| {
            if atomic {
                removed.extend(entry.atomic.pop());
            } else {
                removed = std::mem::take(&mut entry.atomic);
            }
        })?;
        Ok(removed)
    }

    fn shared(&self) -> Result<Option<SessionHandle>, ScopeError> {
        let mut shared = None;
        self.with_entry(&mut |entry| shared = entry.shared.clone())?;
        Ok(shared)
    }

    /// Shared session of the current scope, created with `create` once.
    fn shared_or_insert_with(
        &self,
        create: &mut dyn FnMut() -> SessionHandle,
    ) -> Result<SessionHandle, ScopeError> {
        let mut shared = None;
        self.with_entry(&mut |entry| {
            shared = Some(Arc::clone(entry.shared.get_or_insert_with(&mut *create)));
        })?;
        // with_entry always runs the visitor.
        Ok(shared.unwrap_or_else(&mut *create))
    }

    fn take_shared(&self) -> Result<Option<SessionHandle>, ScopeError> {
        let mut shared = None;
        self.with_entry(&mut |entry| shared = entry.shared.take())?;
        Ok(shared)
    }
}
