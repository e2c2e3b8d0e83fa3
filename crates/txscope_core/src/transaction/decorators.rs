use super::contexts::{AtomicContext, TransientContext};
use crate::error::StoreError;
use crate::factory::SessionFactory;
use crate::session::{SessionHandle, SessionOptions};
use log::error;
use std::sync::Arc;

/// Runs `f` in a new atomic session that is current for its duration.
///
/// Commits on `Ok`, rolls back on `Err`; the callback's error is returned
/// unchanged.
pub fn atomic<T, E, F>(factory: &SessionFactory, f: F) -> Result<T, E>
where
    F: FnOnce(&SessionHandle) -> Result<T, E>,
    E: From<StoreError>,
{
    atomic_with(factory, SessionOptions::atomic(), f)
}

pub fn atomic_with<T, E, F>(factory: &SessionFactory, options: SessionOptions, f: F) -> Result<T, E>
where
    F: FnOnce(&SessionHandle) -> Result<T, E>,
    E: From<StoreError>,
{
    let context = AtomicContext::enter(factory, options)?;
    match f(context.session()) {
        Ok(value) => {
            context.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = context.rollback() {
                error!(
                    "event=atomic_rollback module=transaction status=error error={}",
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

/// Runs `f` inside a savepoint of the current session.
///
/// Only the savepoint is released or rolled back; persisting is left to the
/// enclosing transaction.
pub fn nested<T, E, F>(factory: &SessionFactory, f: F) -> Result<T, E>
where
    F: FnOnce(&SessionHandle) -> Result<T, E>,
    E: From<StoreError>,
{
    let session = factory.get_current_store()?;
    let savepoint = session.begin_nested()?;
    match f(&session) {
        Ok(value) => {
            savepoint.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = savepoint.rollback() {
                error!(
                    "event=nested_rollback module=transaction status=error session={} error={}",
                    session.id(),
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

/// Runs `f` inside a subtransaction of the current session.
///
/// A failure rolls back the parent transaction as well and leaves the
/// session inactive until its owner rolls back.
pub fn subtransaction<T, E, F>(factory: &SessionFactory, f: F) -> Result<T, E>
where
    F: FnOnce(&SessionHandle) -> Result<T, E>,
    E: From<StoreError>,
{
    let session = factory.get_current_store()?;
    let sub = session.begin_subtransaction()?;
    match f(&session) {
        Ok(value) => {
            sub.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = sub.rollback() {
                error!(
                    "event=subtransaction_rollback module=transaction status=error session={} error={}",
                    session.id(),
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

/// Runs `f` in a new atomic session that is rolled back even on success.
///
/// When both the callback and the rollback fail, the callback's error is
/// returned and the rollback failure is only logged.
pub fn transient<T, E, F>(factory: &SessionFactory, f: F) -> Result<T, E>
where
    F: FnOnce(&SessionHandle) -> Result<T, E>,
    E: From<StoreError>,
{
    let context = TransientContext::enter(factory)?;
    let outcome = f(context.session());
    let finished = context.finish();
    let value = outcome?;
    finished?;
    Ok(value)
}

/// Wraps `f` so every call runs through [`atomic`].
pub fn atomic_fn<A, T, E, F>(factory: Arc<SessionFactory>, f: F) -> impl Fn(A) -> Result<T, E>
where
    F: Fn(A) -> Result<T, E>,
    E: From<StoreError>,
{
    move |arg| atomic(&factory, |_| f(arg))
}

pub fn nested_fn<A, T, E, F>(factory: Arc<SessionFactory>, f: F) -> impl Fn(A) -> Result<T, E>
where
    F: Fn(A) -> Result<T, E>,
    E: From<StoreError>,
{
    move |arg| nested(&factory, |_| f(arg))
}

pub fn subtransaction_fn<A, T, E, F>(
    factory: Arc<SessionFactory>,
    f: F,
) -> impl Fn(A) -> Result<T, E>
where
    F: Fn(A) -> Result<T, E>,
    E: From<StoreError>,
{
    move |arg| subtransaction(&factory, |_| f(arg))
}

pub fn transient_fn<A, T, E, F>(factory: Arc<SessionFactory>, f: F) -> impl Fn(A) -> Result<T, E>
where
    F: Fn(A) -> Result<T, E>,
    E: From<StoreError>,
{
    move |arg| transient(&factory, |_| f(arg))
}
