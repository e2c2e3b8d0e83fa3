//! Engines, their connection pools and the bind map routing work to them.
//!
//! # Responsibility
//! - Turn bind configuration into pooled SQLite engines.
//! - Answer "which engine" for bind names, entity types and table names.
//!
//! # Invariants
//! - The bind map is built once and read-only afterwards.

mod open;
mod pool;
mod registry;

pub(crate) use pool::WriteOwner;
pub use pool::{Engine, EngineConnection, PoolStats};
pub use registry::{EngineRegistry, EngineRegistryBuilder};
