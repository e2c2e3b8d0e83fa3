//! Transaction boundaries: atomic, nested, subtransaction and transient.
//!
//! # Responsibility
//! - Own begin/commit/rollback for the wrapped unit of work, which must never
//!   settle the transaction itself.
//! - Push and pop atomic sessions so code running inside an atomic boundary
//!   sees that session as current.
//!
//! # Invariants
//! - Every pushed atomic or transient session is popped exactly once, on
//!   success, error, early return or unwinding.
//! - A failed commit is rolled back before its session is popped.
//! - The wrapped callback's error reaches the caller unchanged.

mod contexts;
mod decorators;

pub use contexts::{AtomicContext, TransientContext};
pub use decorators::{
    atomic, atomic_fn, atomic_with, nested, nested_fn, subtransaction, subtransaction_fn,
    transient, transient_fn,
};
