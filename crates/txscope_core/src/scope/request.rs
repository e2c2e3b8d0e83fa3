//! Request identity supplied by the hosting request pipeline.

use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use uuid::Uuid;

/// Identity of one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Answers which request, if any, the caller is currently serving.
///
/// Multiplexed hosts implement this over whatever task-local mechanism they
/// carry request identity with.
pub trait RequestContextProvider: Send + Sync {
    fn current_request(&self) -> Option<RequestId>;
}

thread_local! {
    static CURRENT_REQUEST: Cell<Option<RequestId>> = const { Cell::new(None) };
}

/// Request context for thread-per-request hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRequestContext;

impl ThreadRequestContext {
    /// Marks the calling thread as serving a fresh request until the guard drops.
    pub fn enter(&self) -> RequestGuard {
        self.enter_with(RequestId::new())
    }

    pub fn enter_with(&self, id: RequestId) -> RequestGuard {
        let previous = CURRENT_REQUEST.with(|current| current.replace(Some(id)));
        RequestGuard {
            id,
            previous,
            _not_send: PhantomData,
        }
    }
}

impl RequestContextProvider for ThreadRequestContext {
    fn current_request(&self) -> Option<RequestId> {
        CURRENT_REQUEST.with(Cell::get)
    }
}

/// Restores the previously active request of the thread on drop.
#[must_use = "the request ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RequestGuard {
    id: RequestId,
    previous: Option<RequestId>,
    _not_send: PhantomData<*const ()>,
}

impl RequestGuard {
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        CURRENT_REQUEST.with(|current| current.set(self.previous));
    }
}
