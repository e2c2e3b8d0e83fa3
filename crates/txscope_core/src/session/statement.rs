//! Statements, per-call execution flags and execution results.

use crate::entity::{Entity, EntityKey};
use rusqlite::types::Value;

/// SQL text with bound parameters, optionally tied to an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
    entity: Option<EntityKey>,
}

impl Statement {
    /// Raw text statement; bind routing falls back to table-name scanning.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            entity: None,
        }
    }

    /// Statement routed through the bind of entity `E`.
    pub fn for_entity<E: Entity>(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            entity: Some(EntityKey::of::<E>()),
        }
    }

    /// Appends one positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn entity(&self) -> Option<&EntityKey> {
        self.entity.as_ref()
    }

    /// True when no entity type is attached.
    pub fn is_raw(&self) -> bool {
        self.entity.is_none()
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::raw(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::raw(sql)
    }
}

/// Per-call execution flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Explicit bind; takes precedence over entity and table routing.
    pub bind_name: Option<String>,
    /// Reject raw statements containing non-transient keywords.
    pub transient: bool,
}

impl ExecuteOptions {
    pub fn bind(bind_name: impl Into<String>) -> Self {
        Self {
            bind_name: Some(bind_name.into()),
            transient: false,
        }
    }

    pub fn transient() -> Self {
        Self {
            bind_name: None,
            transient: true,
        }
    }

    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }
}

/// Outcome of [`crate::session::Session::execute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteResult {
    pub bind_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: usize,
}

impl ExecuteResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First column of the first row.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// First column of the first row when it is an integer.
    pub fn scalar_i64(&self) -> Option<i64> {
        match self.scalar() {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }
}
