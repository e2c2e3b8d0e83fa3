use super::shards::ShardedMap;
use super::{ScopeEntry, ScopeRegistry};
use crate::error::ScopeError;
use crate::scope::{RequestContextProvider, RequestId, RequestScopeResolver, ScopeResolver, ScopeToken};
use std::sync::Arc;

/// Registry keyed by the active request.
///
/// A request may hop between threads; its entry follows the request id, not
/// the thread.
#[derive(Debug)]
pub struct RequestScopedRegistry {
    resolver: RequestScopeResolver,
    entries: ShardedMap<RequestId>,
}

impl RequestScopedRegistry {
    pub fn new(context: Arc<dyn RequestContextProvider>) -> Self {
        Self {
            resolver: RequestScopeResolver::new(context),
            entries: ShardedMap::new(),
        }
    }

    /// True when the context reports an active request.
    pub fn is_active(&self) -> bool {
        self.resolver.current_request().is_some()
    }

    fn request(&self) -> Result<RequestId, ScopeError> {
        match self.resolver.resolve()? {
            ScopeToken::Request(id) => Ok(id),
            ScopeToken::Thread(_) => Err(ScopeError::NoActiveRequest),
        }
    }
}

impl ScopeRegistry for RequestScopedRegistry {
    fn scope(&self) -> Result<ScopeToken, ScopeError> {
        self.resolver.resolve()
    }

    fn with_entry(&self, visit: &mut dyn FnMut(&mut ScopeEntry)) -> Result<(), ScopeError> {
        let request = self.request()?;
        self.entries.visit(request, visit);
        Ok(())
    }

    fn active_scopes(&self) -> usize {
        self.entries.len()
    }
}
