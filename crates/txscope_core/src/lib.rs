//! Transaction scoping and session lifecycle for SQLite-backed services.
//!
//! Every unit of work (a request or a thread) gets one shared session;
//! `atomic`, `nested`, `subtransaction` and `transient` boundaries compose on
//! top of it, and the lifecycle hooks settle and discard it at scope end.

pub mod config;
pub mod database;
pub mod engine;
pub mod entity;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod logging;
pub mod registry;
pub mod scope;
pub mod session;
pub mod sql;
pub mod transaction;

pub use config::{BindConfig, DatabaseConfig, LoggingConfig, SessionDefaults, DEFAULT_BIND};
pub use database::{Database, DatabaseBuilder};
pub use engine::{Engine, EngineConnection, EngineRegistry, EngineRegistryBuilder, PoolStats};
pub use entity::{Entity, EntityKey, EntityRecord};
pub use error::{ConfigError, ScopeError, StoreError, StoreResult};
pub use factory::SessionFactory;
pub use hooks::{cleanup, finalize, Outcome, StatusOutcome};
pub use logging::{default_log_level, init_logging, logging_status};
pub use scope::{RequestContextProvider, RequestGuard, RequestId, ScopeToken, ThreadRequestContext};
pub use session::{
    ExecuteOptions, ExecuteResult, Savepoint, Session, SessionHandle, SessionOptions, Statement,
    Subtransaction,
};
pub use transaction::{AtomicContext, TransientContext};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
