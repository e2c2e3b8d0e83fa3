//! Session: unit of work over lazily checked-out engine connections.
//!
//! # Responsibility
//! - Stage entity writes and flush them inside the session transaction.
//! - Route statements to engines (explicit bind, entity, raw table scan,
//!   default bind) and guard transient raw SQL.
//! - Drive savepoints and subtransactions on every open connection.
//!
//! # Invariants
//! - `autocommit` is always false; every commit is explicit.
//! - Connections leave the session only through commit, rollback, close or
//!   drop, and never with an open transaction.

mod guards;
mod handle;
mod statement;

pub use guards::{Savepoint, Subtransaction};
pub use handle::{Session, SessionHandle, SessionOptions};
pub use statement::{ExecuteOptions, ExecuteResult, Statement};
