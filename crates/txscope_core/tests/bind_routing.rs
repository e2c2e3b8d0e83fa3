mod common;

use common::{committed_names, config, customers, fixture, Customer, Report};
use rusqlite::types::Value;
use txscope_core::{
    ConfigError, Database, DatabaseConfig, Entity, ExecuteOptions, Statement, StatusOutcome,
    StoreError,
};

#[test]
fn entity_and_raw_sql_resolve_to_the_same_bind() {
    let fixture = fixture();
    let session = fixture.db.get_current_store().expect("shared session should open");

    let by_entity = session
        .get_bind(None, &Statement::for_entity::<Report>("SELECT name FROM reports"))
        .expect("entity bind should resolve");
    let by_table = session
        .get_bind(None, &Statement::raw("SELECT r.name FROM reports r WHERE r.id > 0"))
        .expect("table bind should resolve");
    assert_eq!(by_entity.bind_name(), "reporting");
    assert_eq!(by_table.bind_name(), "reporting");

    let unmapped = session
        .get_bind(None, &Statement::raw("SELECT name FROM customers"))
        .expect("unmapped table should fall back");
    assert_eq!(unmapped.bind_name(), "default");

    let joined = session
        .get_bind(
            None,
            &Statement::raw("SELECT * FROM customers c JOIN reports r ON r.id = c.id"),
        )
        .expect("joined tables should resolve");
    assert_eq!(joined.bind_name(), "reporting");
}

#[test]
fn explicit_bind_takes_precedence_and_unknown_binds_fail() {
    let fixture = fixture();
    let session = fixture.db.get_current_store().expect("shared session should open");

    let explicit = session
        .get_bind(Some("default"), &Statement::for_entity::<Report>("SELECT 1"))
        .expect("explicit bind should resolve");
    assert_eq!(explicit.bind_name(), "default");

    match session
        .execute("SELECT 1", ExecuteOptions::bind("archive"))
        .unwrap_err()
    {
        StoreError::UnknownBind(name) => assert_eq!(name, "archive"),
        other => panic!("unexpected error: {other}"),
    }
    fixture.db.remove(false).expect("remove should succeed");
}

#[test]
fn entities_flush_to_their_bound_engine() {
    let fixture = fixture();
    let db = &fixture.db;

    let session = db.get_current_store().expect("shared session should open");
    session.add(&Customer { name: "ada" }).unwrap();
    session.add(&Report { name: "q3" }).unwrap();

    let rows = session
        .execute(
            Statement::raw("SELECT name FROM reports WHERE name = ?1").bind("q3".to_string()),
            ExecuteOptions::default(),
        )
        .expect("routed select should run");
    assert_eq!(rows.bind_name, "reporting");
    assert_eq!(rows.rows, vec![vec![Value::Text("q3".to_string())]]);

    assert_eq!(db.finalize(StatusOutcome::OK), StatusOutcome::OK);
    assert_eq!(customers(db), vec!["ada"]);
    assert_eq!(committed_names(db, "reporting", "reports"), vec!["q3"]);

    let records = db
        .atomic(|session| -> Result<_, StoreError> {
            session.add(&Report { name: "q4" })?;
            session.flush()?;
            Ok(session.identity())
        })
        .expect("atomic report should commit");
    assert_eq!(records[0].bind_name, "reporting");
    assert_eq!(records[0].entity, txscope_core::EntityKey::of::<Report>());
}

#[test]
fn transient_guard_rejects_before_touching_the_database() {
    let fixture = fixture();
    let db = &fixture.db;
    let session = db.get_atomic_store(Default::default());

    for sql in [
        "DROP TABLE customers",
        "create table t (id integer)",
        "SELECT 1; COMMIT",
        "ALTER TABLE customers ADD COLUMN x",
    ] {
        let err = session
            .execute(sql, ExecuteOptions::transient())
            .unwrap_err();
        assert!(err.is_transient_violation(), "{sql} was not rejected");
    }
    assert!(!session.in_transaction());
    assert_eq!(db.engines().default_engine().stats().checked_out, 0);

    let one = session
        .execute("SELECT 1", ExecuteOptions::transient())
        .expect("read-only sql should pass the guard");
    assert_eq!(one.scalar_i64(), Some(1));
    assert_eq!(one.bind_name, "default");
    session.rollback().expect("rollback should succeed");
}

#[test]
fn transient_blocks_never_persist() {
    let fixture = fixture();
    let db = &fixture.db;

    let seen = db
        .transient(|session| -> Result<_, StoreError> {
            session.execute(
                "INSERT INTO customers (name) VALUES ('ghost')",
                ExecuteOptions::default(),
            )?;
            session
                .execute(
                    "SELECT COUNT(*) FROM customers",
                    ExecuteOptions::transient(),
                )
                .map(|result| result.scalar_i64())
        })
        .expect("transient block should run");
    assert_eq!(seen, Some(1));
    assert!(customers(db).is_empty());

    let context = db.transient_context().expect("transient context should enter");
    context.session().add(&Customer { name: "scratch" }).unwrap();
    context.finish().expect("transient context should finish");
    assert!(customers(db).is_empty());
    assert!(db.factory().atomic_stack().unwrap().is_empty());
}

struct Orphan;

impl Entity for Orphan {
    const TABLE: &'static str = "orphans";

    fn values(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

struct Ledger;

impl Entity for Ledger {
    const TABLE: &'static str = "reports";

    fn values(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

#[test]
fn bind_configuration_errors_abort_build() {
    let dir = tempfile::tempdir().expect("temp dir should be created");

    let err = Database::builder(config(&dir))
        .register_bind::<Orphan>("archive")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Config(ConfigError::UnknownEntityBind { ref bind_name, .. }) if bind_name == "archive"
    ));

    let err = Database::builder(config(&dir))
        .register_bind::<Report>("reporting")
        .register_bind::<Ledger>("default")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Config(ConfigError::ConflictingTableBind { ref table, .. }) if table == "reports"
    ));

    let err = DatabaseConfig::from_toml_str("[binds.reporting]\nurl = \"sqlite::memory:\"\n")
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingDefaultBind));
}
