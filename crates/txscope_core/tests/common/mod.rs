#![allow(dead_code)]

use rusqlite::types::Value;
use std::fmt::{Display, Formatter};
use tempfile::TempDir;
use txscope_core::{BindConfig, Database, DatabaseConfig, Entity, StoreError};

/// Stored in the default bind.
pub struct Customer {
    pub name: &'static str,
}

impl Entity for Customer {
    const TABLE: &'static str = "customers";

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![("name", Value::Text(self.name.to_string()))]
    }
}

/// Bound to the `reporting` bind.
pub struct Report {
    pub name: &'static str,
}

impl Entity for Report {
    const TABLE: &'static str = "reports";

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![("name", Value::Text(self.name.to_string()))]
    }
}

#[derive(Debug)]
pub enum AppError {
    Store(StoreError),
    Boom(&'static str),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store: {err}"),
            Self::Boom(reason) => write!(f, "boom: {reason}"),
        }
    }
}

impl std::error::Error for AppError {}

pub struct Fixture {
    pub dir: TempDir,
    pub db: Database,
}

pub fn config(dir: &TempDir) -> DatabaseConfig {
    let main = dir.path().join("main.db").display().to_string();
    let reporting = dir.path().join("reporting.db").display().to_string();
    DatabaseConfig::new(format!("sqlite://{main}"))
        .with_bind("reporting", BindConfig::new(format!("sqlite://{reporting}")))
}

/// Two file-backed binds; `customers` lives in `default`, `reports` in
/// `reporting`.
pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let db = Database::builder(config(&dir))
        .register_bind::<Report>("reporting")
        .build()
        .expect("fixture database should build");

    ddl(
        &db,
        "default",
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);",
    );
    ddl(
        &db,
        "reporting",
        "CREATE TABLE reports (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );
    Fixture { dir, db }
}

fn ddl(db: &Database, bind_name: &str, sql: &str) {
    let engine = db.engines().bind_engine(bind_name).expect("bind should exist");
    let conn = engine.checkout().expect("checkout should succeed");
    conn.execute_batch(sql).expect("schema should apply");
}

/// Names committed to `table` on `bind_name`, read outside any session.
pub fn committed_names(db: &Database, bind_name: &str, table: &str) -> Vec<String> {
    let engine = db.engines().bind_engine(bind_name).expect("bind should exist");
    let conn = engine.checkout().expect("checkout should succeed");
    let mut stmt = conn
        .prepare(&format!("SELECT name FROM {table} ORDER BY id"))
        .expect("select should prepare");
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .expect("select should run")
        .collect::<Result<Vec<_>, _>>()
        .expect("names should decode");
    names
}

pub fn customers(db: &Database) -> Vec<String> {
    committed_names(db, "default", "customers")
}

/// Asserts every pooled connection went back to its engine.
pub fn assert_connections_returned(db: &Database) {
    for (bind_name, engine) in db.engines().bounded_engines() {
        assert_eq!(
            engine.stats().checked_out,
            0,
            "bind `{bind_name}` still has checked out connections"
        );
    }
}
