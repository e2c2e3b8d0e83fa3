//! Scope tokens and the resolvers producing them.
//!
//! # Responsibility
//! - Identify "the current unit of work" as a hashable token.
//! - Let hosts say whether a request is active on the calling thread.
//!
//! # Invariants
//! - Within one unit of work a resolver always returns the same token; tokens
//!   of concurrent units of work never collide.

mod request;
mod resolver;

pub use request::{RequestContextProvider, RequestGuard, RequestId, ThreadRequestContext};
pub use resolver::{RequestScopeResolver, ScopeResolver, ScopeToken, ThreadScopeResolver};
