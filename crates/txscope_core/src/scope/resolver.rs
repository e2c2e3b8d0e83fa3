use super::request::{RequestContextProvider, RequestId};
use crate::error::ScopeError;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Identity of the current unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeToken {
    Thread(ThreadId),
    Request(RequestId),
}

impl Display for ScopeToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thread(id) => write!(f, "thread:{id:?}"),
            Self::Request(id) => write!(f, "request:{id}"),
        }
    }
}

pub trait ScopeResolver: Send + Sync {
    fn resolve(&self) -> Result<ScopeToken, ScopeError>;
}

/// Scope of background workers, CLIs and startup code.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScopeResolver;

impl ScopeResolver for ThreadScopeResolver {
    fn resolve(&self) -> Result<ScopeToken, ScopeError> {
        Ok(ScopeToken::Thread(thread::current().id()))
    }
}

/// Scope of the active request; fails when none is active.
#[derive(Clone)]
pub struct RequestScopeResolver {
    context: Arc<dyn RequestContextProvider>,
}

impl RequestScopeResolver {
    pub fn new(context: Arc<dyn RequestContextProvider>) -> Self {
        Self { context }
    }

    pub fn current_request(&self) -> Option<RequestId> {
        self.context.current_request()
    }
}

impl ScopeResolver for RequestScopeResolver {
    fn resolve(&self) -> Result<ScopeToken, ScopeError> {
        self.context
            .current_request()
            .map(ScopeToken::Request)
            .ok_or(ScopeError::NoActiveRequest)
    }
}

impl std::fmt::Debug for RequestScopeResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScopeResolver").finish_non_exhaustive()
    }
}
