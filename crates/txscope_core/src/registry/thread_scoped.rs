use super::{ScopeEntry, ScopeRegistry};
use crate::error::ScopeError;
use crate::scope::{ScopeResolver, ScopeToken, ThreadScopeResolver};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Keyed by registry instance so independent databases never share state.
    static THREAD_ENTRIES: RefCell<HashMap<u64, ScopeEntry>> = RefCell::new(HashMap::new());
}

/// Registry for code running outside any request.
///
/// Entries live in thread-local storage, so no lock is taken. Entries left
/// behind on a thread are dropped when the thread exits.
#[derive(Debug)]
pub struct ThreadScopedRegistry {
    id: u64,
}

impl ThreadScopedRegistry {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for ThreadScopedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry for ThreadScopedRegistry {
    fn scope(&self) -> Result<ScopeToken, ScopeError> {
        ThreadScopeResolver.resolve()
    }

    fn with_entry(&self, visit: &mut dyn FnMut(&mut ScopeEntry)) -> Result<(), ScopeError> {
        let removed = THREAD_ENTRIES.with(|entries| {
            let mut entries = entries.borrow_mut();
            let entry = entries.entry(self.id).or_default();
            visit(entry);
            if entry.is_empty() {
                entries.remove(&self.id)
            } else {
                None
            }
        });
        drop(removed);
        Ok(())
    }

    fn active_scopes(&self) -> usize {
        THREAD_ENTRIES.with(|entries| usize::from(entries.borrow().contains_key(&self.id)))
    }
}
