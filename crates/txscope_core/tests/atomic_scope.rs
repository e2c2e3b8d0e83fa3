mod common;

use common::{
    assert_connections_returned, committed_names, customers, fixture, AppError, Customer, Report,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use txscope_core::{ExecuteOptions, SessionOptions, StatusOutcome, StoreError, ThreadRequestContext};

#[test]
fn nested_atomic_calls_see_their_own_session() {
    let fixture = fixture();
    let db = &fixture.db;
    let shared = db.get_current_store().expect("shared session should open");
    assert!(!shared.is_atomic());

    db.atomic(|first| -> Result<(), StoreError> {
        assert!(first.is_atomic());
        assert!(Arc::ptr_eq(&db.get_current_store()?, first));

        db.atomic(|second| -> Result<(), StoreError> {
            assert!(!Arc::ptr_eq(first, second));
            assert!(Arc::ptr_eq(&db.get_current_store()?, second));

            db.atomic(|third| -> Result<(), StoreError> {
                assert!(Arc::ptr_eq(&db.get_current_store()?, third));
                assert_eq!(db.factory().atomic_stack()?.len(), 3);
                Ok(())
            })?;

            assert!(Arc::ptr_eq(&db.get_current_store()?, second));
            Ok(())
        })?;

        assert!(Arc::ptr_eq(&db.get_current_store()?, first));
        Ok(())
    })
    .expect("atomic chain should commit");

    assert!(Arc::ptr_eq(&db.get_current_store().unwrap(), &shared));
    assert!(db.factory().atomic_stack().unwrap().is_empty());
    db.remove(false).expect("remove should succeed");
}

#[test]
fn failed_atomic_write_is_invisible_while_shared_work_stays_pending() {
    let fixture = fixture();
    let db = &fixture.db;

    let shared = db.get_current_store().expect("shared session should open");
    shared.add(&Customer { name: "before" }).unwrap();

    let result: Result<(), AppError> = db.atomic(|session| {
        session.add(&Customer { name: "inside" })?;
        session.flush()?;
        Err(AppError::Boom("atomic body failed"))
    });
    assert!(matches!(result, Err(AppError::Boom(_))));

    assert_eq!(shared.pending_count(), 1);
    assert!(customers(db).is_empty());

    assert_eq!(db.finalize(StatusOutcome::OK), StatusOutcome::OK);
    assert_eq!(customers(db), vec!["before"]);
    assert_connections_returned(db);
}

#[test]
fn committed_atomic_work_outlives_a_rolled_back_scope() {
    let fixture = fixture();
    let db = &fixture.db;

    let shared = db.get_current_store().expect("shared session should open");
    shared.add(&Customer { name: "scoped" }).unwrap();
    db.atomic(|session| session.add(&Customer { name: "audit" }))
        .expect("atomic write should commit");

    assert_eq!(
        db.finalize(StatusOutcome::new(500)),
        StatusOutcome::new(500)
    );
    assert_eq!(customers(db), vec!["audit"]);
}

#[test]
fn atomic_write_behind_a_flushed_shared_session_fails_fast() {
    let fixture = fixture();
    let db = &fixture.db;
    let busy_timeout = Duration::from_millis(
        db.engines().default_engine().config().busy_timeout_ms,
    );

    let shared = db.get_current_store().expect("shared session should open");
    shared.add(&Customer { name: "C" }).unwrap();
    shared
        .execute("SELECT COUNT(*) FROM customers", ExecuteOptions::default())
        .expect("autoflushing select should run");
    assert_eq!(db.engines().default_engine().writer(), Some(shared.id()));

    let started_at = Instant::now();
    let blocked: Result<(), StoreError> =
        db.atomic(|session| session.add(&Customer { name: "A" }));
    match blocked {
        Err(StoreError::WriteConflict { bind_name, holder }) => {
            assert_eq!(bind_name, "default");
            assert_eq!(holder, shared.id());
        }
        other => panic!("unexpected atomic result: {other:?}"),
    }
    assert!(started_at.elapsed() < busy_timeout);
    assert!(db.factory().atomic_stack().unwrap().is_empty());

    db.atomic(|session| session.add(&Report { name: "side" }))
        .expect("atomic write on another bind should commit");
    assert_eq!(committed_names(db, "reporting", "reports"), vec!["side"]);

    assert_eq!(db.finalize(StatusOutcome::OK), StatusOutcome::OK);
    assert_eq!(db.engines().default_engine().writer(), None);
    db.atomic(|session| session.add(&Customer { name: "A" }))
        .expect("atomic write should commit once the scope released the bind");
    assert_eq!(customers(db), vec!["C", "A"]);
    assert_connections_returned(db);
}

#[test]
fn atomic_inside_nested_reports_the_savepoint_holder() {
    let fixture = fixture();
    let db = &fixture.db;

    let shared = db.get_current_store().expect("shared session should open");
    shared.add(&Customer { name: "outer" }).unwrap();

    let result: Result<(), StoreError> = db.nested(|session| {
        assert_eq!(session.id(), shared.id());
        db.atomic(|atomic| atomic.add(&Customer { name: "audit" }))
    });
    assert!(matches!(result, Err(StoreError::WriteConflict { .. })));
    assert_eq!(shared.pending_count(), 0);

    assert_eq!(db.finalize(StatusOutcome::OK), StatusOutcome::OK);
    assert_eq!(customers(db), vec!["outer"]);
    assert_connections_returned(db);
}

#[test]
fn inner_atomic_failure_rolls_back_the_whole_chain_but_not_the_scope() {
    let fixture = fixture();
    let db = &fixture.db;
    let _request = ThreadRequestContext.enter();

    db.get_current_store()
        .expect("request session should open")
        .add(&Customer { name: "C" })
        .unwrap();

    let g = || -> Result<(), AppError> {
        db.atomic(|session| {
            session.add(&Customer { name: "B" })?;
            Err(AppError::Boom("g"))
        })
    };
    let f = || -> Result<(), AppError> {
        db.atomic(|session| {
            session.add(&Customer { name: "A" })?;
            g()
        })
    };
    assert!(matches!(f(), Err(AppError::Boom("g"))));

    assert_eq!(db.finalize(StatusOutcome::OK), StatusOutcome::OK);
    assert_eq!(customers(db), vec!["C"]);
    assert_eq!(db.factory().active_scopes(), 0);
    assert_connections_returned(db);
}

#[test]
fn atomic_sessions_keep_identity_after_commit() {
    let fixture = fixture();
    let db = &fixture.db;

    let records = db
        .atomic(|session| -> Result<_, StoreError> {
            session.add(&Customer { name: "kept" })?;
            session.commit()?;
            Ok(session.identity())
        })
        .expect("atomic write should commit");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].bind_name, "default");
    assert_eq!(records[0].entity.table(), "customers");

    let expiring = db
        .atomic_with(
            SessionOptions::atomic().with_expire_on_commit(true),
            |session| -> Result<_, StoreError> {
                session.add(&Customer { name: "expired" })?;
                session.commit()?;
                Ok(session.identity())
            },
        )
        .expect("expiring atomic write should commit");
    assert!(expiring.is_empty());
    assert_eq!(customers(db), vec!["kept", "expired"]);
}

#[test]
fn failed_commit_rolls_back_and_still_pops() {
    let fixture = fixture();
    let db = &fixture.db;
    db.atomic(|session| session.add(&Customer { name: "dup" }))
        .expect("first write should commit");

    let result: Result<(), StoreError> = db.atomic(|session| {
        session.add(&Customer { name: "other" })?;
        session.add(&Customer { name: "dup" })
    });
    assert!(matches!(result, Err(StoreError::Sqlite { .. })));

    assert_eq!(customers(db), vec!["dup"]);
    assert!(db.factory().atomic_stack().unwrap().is_empty());
    assert_connections_returned(db);
}

#[test]
fn panicking_body_rolls_back_and_pops() {
    let fixture = fixture();
    let db = &fixture.db;

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        db.atomic(|session| -> Result<(), StoreError> {
            session.add(&Customer { name: "panicked" })?;
            session.flush()?;
            panic!("body panicked mid-transaction");
        })
    }));
    assert!(outcome.is_err());

    assert!(db.factory().atomic_stack().unwrap().is_empty());
    assert!(customers(db).is_empty());
    assert_connections_returned(db);
}

#[test]
fn atomic_context_commits_or_rolls_back_on_drop() {
    let fixture = fixture();
    let db = &fixture.db;

    let context = db
        .atomic_context(SessionOptions::atomic())
        .expect("atomic context should enter");
    context.session().add(&Customer { name: "guarded" }).unwrap();
    assert!(Arc::ptr_eq(
        &db.get_current_store().unwrap(),
        context.session()
    ));
    context.commit().expect("guarded write should commit");

    {
        let dropped = db
            .atomic_context(SessionOptions::atomic())
            .expect("atomic context should enter");
        dropped.session().add(&Customer { name: "dropped" }).unwrap();
        dropped.session().flush().expect("flush should succeed");
    }

    assert_eq!(customers(db), vec!["guarded"]);
    assert!(!db.get_current_store().unwrap().is_atomic());
    db.remove(false).expect("remove should succeed");
    assert_connections_returned(db);
}

#[test]
fn explicit_context_rollback_discards_and_pops() {
    let fixture = fixture();
    let db = &fixture.db;

    let context = db
        .atomic_context(SessionOptions::atomic())
        .expect("atomic context should enter");
    context.session().add(&Customer { name: "undone" }).unwrap();
    context.session().flush().expect("flush should succeed");
    context.rollback().expect("rollback should succeed");

    assert!(db.factory().atomic_stack().unwrap().is_empty());
    assert!(customers(db).is_empty());
    assert_connections_returned(db);
}

#[test]
fn remove_without_sessions_is_a_no_op() {
    let fixture = fixture();
    let db = &fixture.db;

    db.remove(true).expect("removing a missing atomic session should succeed");
    db.remove(true).expect("removing twice should succeed");
    db.remove(false).expect("removing the scope should succeed");
    assert_eq!(db.factory().active_scopes(), 0);
}

#[test]
fn commit_all_and_rollback_all_cover_atomic_and_shared() {
    let fixture = fixture();
    let db = &fixture.db;

    let shared = db.get_current_store().expect("shared session should open");
    shared.add(&Customer { name: "shared" }).unwrap();
    let context = db
        .atomic_context(SessionOptions::atomic())
        .expect("atomic context should enter");
    context.session().add(&Customer { name: "atomic" }).unwrap();

    db.commit_all(true).expect("atomic session should commit");
    assert_eq!(customers(db), vec!["atomic"]);
    assert_eq!(shared.pending_count(), 1);

    db.rollback_all(false).expect("both sessions should roll back");
    assert_eq!(shared.pending_count(), 0);
    context.rollback().expect("context should settle");
    db.remove(false).expect("remove should succeed");
    assert_eq!(customers(db), vec!["atomic"]);
}
