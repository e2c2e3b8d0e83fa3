//! Engine bind map: bind name, entity type and table name to engine.
//!
//! # Responsibility
//! - Build one [`Engine`] per configured bind at startup.
//! - Route entity types and raw table names to their engines.
//!
//! # Invariants
//! - Every entity bound through [`EngineRegistryBuilder::register_bind`]
//!   resolves to a configured bind, checked in `build()`, never lazily.
//! - The built registry is immutable; lookups take no locks.

use super::pool::Engine;
use crate::config::{DatabaseConfig, DEFAULT_BIND};
use crate::entity::{Entity, EntityKey};
use crate::error::{ConfigError, StoreError, StoreResult};
use log::info;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Collects entity binds before the bind map is frozen.
#[derive(Debug)]
pub struct EngineRegistryBuilder {
    config: DatabaseConfig,
    entity_binds: Vec<(EntityKey, String)>,
}

/// Frozen bind map shared by every session.
#[derive(Debug)]
pub struct EngineRegistry {
    default: Arc<Engine>,
    binds: HashMap<String, Arc<Engine>>,
    entities: HashMap<TypeId, Arc<Engine>>,
    tables: HashMap<String, Arc<Engine>>,
}

impl EngineRegistryBuilder {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            entity_binds: Vec::new(),
        }
    }

    /// Binds entity `E` (and therefore its table) to `bind_name`.
    pub fn register_bind<E: Entity>(&mut self, bind_name: impl Into<String>) -> &mut Self {
        self.register_bind_key(EntityKey::of::<E>(), bind_name)
    }

    pub fn register_bind_key(
        &mut self,
        entity: EntityKey,
        bind_name: impl Into<String>,
    ) -> &mut Self {
        self.entity_binds.push((entity, bind_name.into()));
        self
    }

    /// Validates configuration and entity binds and builds every engine.
    pub fn build(self) -> StoreResult<EngineRegistry> {
        self.config.validate()?;

        let mut binds = HashMap::new();
        for (bind_name, bind) in &self.config.binds {
            let engine = Engine::new(bind_name, bind.clone())?;
            binds.insert(bind_name.clone(), Arc::new(engine));
        }
        let default = binds
            .get(DEFAULT_BIND)
            .cloned()
            .ok_or(ConfigError::MissingDefaultBind)?;

        let mut entities: HashMap<TypeId, Arc<Engine>> = HashMap::new();
        let mut tables: HashMap<String, Arc<Engine>> = HashMap::new();
        for (entity, bind_name) in &self.entity_binds {
            let engine = binds
                .get(bind_name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownEntityBind {
                    entity: entity.type_name(),
                    bind_name: bind_name.clone(),
                })?;

            if let Some(existing) = entities.get(&entity.type_id()) {
                if existing.bind_name() != bind_name {
                    return Err(ConfigError::ConflictingEntityBind {
                        entity: entity.type_name(),
                        first: existing.bind_name().to_string(),
                        second: bind_name.clone(),
                    }
                    .into());
                }
            }

            let table = entity.table().to_ascii_lowercase();
            if let Some(existing) = tables.get(&table) {
                if existing.bind_name() != bind_name {
                    return Err(ConfigError::ConflictingTableBind {
                        table,
                        first: existing.bind_name().to_string(),
                        second: bind_name.clone(),
                    }
                    .into());
                }
            }

            entities.insert(entity.type_id(), Arc::clone(&engine));
            tables.insert(table, engine);
        }

        info!(
            "event=engine_registry_build module=engine status=ok binds={} entity_binds={}",
            binds.len(),
            entities.len()
        );

        Ok(EngineRegistry {
            default,
            binds,
            entities,
            tables,
        })
    }
}

impl EngineRegistry {
    pub fn default_engine(&self) -> &Arc<Engine> {
        &self.default
    }

    /// All configured engines keyed by bind name.
    pub fn bounded_engines(&self) -> &HashMap<String, Arc<Engine>> {
        &self.binds
    }

    /// Bind names in sorted order.
    pub fn bind_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.binds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Engine of `bind_name`, or [`StoreError::UnknownBind`].
    pub fn bind_engine(&self, bind_name: &str) -> StoreResult<Arc<Engine>> {
        self.binds
            .get(bind_name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownBind(bind_name.to_string()))
    }

    /// Engine explicitly bound to the entity type, if any.
    pub fn entity_engine(&self, entity: &EntityKey) -> Option<Arc<Engine>> {
        self.entities.get(&entity.type_id()).cloned()
    }

    /// Engine bound to a table through its entity, if any.
    pub fn table_engine(&self, table: &str) -> Option<Arc<Engine>> {
        self.tables.get(&table.to_ascii_lowercase()).cloned()
    }
}
