//! Entity contract consumed by sessions.
//!
//! Entities are only staged and flushed here; querying them back is left to
//! raw statements.

use rusqlite::types::Value;
use std::any::TypeId;
use std::fmt::{Display, Formatter};

/// A persistable row type mapped to one table.
pub trait Entity: 'static {
    /// Table the entity is stored in.
    const TABLE: &'static str;

    /// Column/value pairs written on insert.
    fn values(&self) -> Vec<(&'static str, Value)>;
}

/// Identity of an entity type, used as the key of the entity bind map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey {
    type_id: TypeId,
    type_name: &'static str,
    table: &'static str,
}

impl EntityKey {
    pub fn of<E: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            table: E::TABLE,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &'static str {
        self.table
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_name, self.table)
    }
}

/// A row a session flushed in its current transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub entity: EntityKey,
    pub bind_name: String,
    pub rowid: i64,
}
