//! Application-facing entry point wiring engines, scopes and sessions.
//!
//! # Responsibility
//! - Build the engine registry and session factory once at startup.
//! - Expose the session and transaction API without ambient globals.

use crate::config::DatabaseConfig;
use crate::engine::{EngineRegistry, EngineRegistryBuilder};
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::factory::SessionFactory;
use crate::hooks::{self, Outcome};
use crate::scope::{RequestContextProvider, ThreadRequestContext};
use crate::session::{SessionHandle, SessionOptions};
use crate::sql::{RegexTableExtractor, TableNameExtractor};
use crate::transaction::{self, AtomicContext, TransientContext};
use std::sync::Arc;

/// Collects startup registrations before the bind map is frozen.
pub struct DatabaseBuilder {
    registry: EngineRegistryBuilder,
    defaults: SessionOptions,
    context: Arc<dyn RequestContextProvider>,
    extractor: Arc<dyn TableNameExtractor>,
}

impl DatabaseBuilder {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            defaults: config.session.into(),
            registry: EngineRegistryBuilder::new(config),
            context: Arc::new(ThreadRequestContext),
            extractor: Arc::new(RegexTableExtractor),
        }
    }

    /// Routes entity `E` and its table to `bind_name`.
    pub fn register_bind<E: Entity>(mut self, bind_name: impl Into<String>) -> Self {
        self.registry.register_bind::<E>(bind_name);
        self
    }

    /// Replaces the default [`ThreadRequestContext`].
    pub fn request_context(mut self, context: Arc<dyn RequestContextProvider>) -> Self {
        self.context = context;
        self
    }

    pub fn table_extractor(mut self, extractor: Arc<dyn TableNameExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Validates configuration and binds, then builds every engine.
    pub fn build(self) -> StoreResult<Database> {
        let engines = Arc::new(self.registry.build()?);
        let factory = Arc::new(SessionFactory::new(
            Arc::clone(&engines),
            self.extractor,
            self.context,
            self.defaults,
        ));
        Ok(Database { engines, factory })
    }
}

/// Engines plus the session factory; cheap to clone and share.
#[derive(Debug, Clone)]
pub struct Database {
    engines: Arc<EngineRegistry>,
    factory: Arc<SessionFactory>,
}

impl Database {
    pub fn builder(config: DatabaseConfig) -> DatabaseBuilder {
        DatabaseBuilder::new(config)
    }

    /// Builds a database without entity binds.
    pub fn open(config: DatabaseConfig) -> StoreResult<Self> {
        DatabaseBuilder::new(config).build()
    }

    pub fn engines(&self) -> &Arc<EngineRegistry> {
        &self.engines
    }

    pub fn factory(&self) -> &Arc<SessionFactory> {
        &self.factory
    }

    pub fn get_current_store(&self) -> StoreResult<SessionHandle> {
        self.factory.get_current_store()
    }

    pub fn get_current_store_with(&self, options: SessionOptions) -> StoreResult<SessionHandle> {
        self.factory.get_current_store_with(options)
    }

    pub fn get_atomic_store(&self, options: SessionOptions) -> SessionHandle {
        self.factory.get_atomic_store(options)
    }

    pub fn remove(&self, atomic: bool) -> StoreResult<()> {
        self.factory.remove(atomic)
    }

    pub fn commit_all(&self, atomic: bool) -> StoreResult<()> {
        self.factory.commit_all(atomic)
    }

    pub fn rollback_all(&self, atomic: bool) -> StoreResult<()> {
        self.factory.rollback_all(atomic)
    }

    pub fn atomic<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&SessionHandle) -> Result<T, E>,
        E: From<StoreError>,
    {
        transaction::atomic(&self.factory, f)
    }

    pub fn atomic_with<T, E, F>(&self, options: SessionOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&SessionHandle) -> Result<T, E>,
        E: From<StoreError>,
    {
        transaction::atomic_with(&self.factory, options, f)
    }

    pub fn nested<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&SessionHandle) -> Result<T, E>,
        E: From<StoreError>,
    {
        transaction::nested(&self.factory, f)
    }

    pub fn subtransaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&SessionHandle) -> Result<T, E>,
        E: From<StoreError>,
    {
        transaction::subtransaction(&self.factory, f)
    }

    pub fn transient<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&SessionHandle) -> Result<T, E>,
        E: From<StoreError>,
    {
        transaction::transient(&self.factory, f)
    }

    pub fn atomic_context(&self, options: SessionOptions) -> StoreResult<AtomicContext<'_>> {
        AtomicContext::enter(&self.factory, options)
    }

    pub fn transient_context(&self) -> StoreResult<TransientContext<'_>> {
        TransientContext::enter(&self.factory)
    }

    pub fn finalize<O: Outcome>(&self, outcome: O) -> O {
        hooks::finalize(&self.factory, outcome)
    }

    pub fn cleanup(&self, cause: Option<&dyn std::error::Error>) {
        hooks::cleanup(&self.factory, cause)
    }
}
