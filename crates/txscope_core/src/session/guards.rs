//! Scoped savepoint and subtransaction boundaries on a session.
//!
//! Both guards roll back when dropped unsettled, so early returns and
//! unwinding close the boundary they opened.

use super::handle::Session;
use crate::error::StoreResult;
use log::error;

/// An open `SAVEPOINT` on every connection of a session.
#[must_use = "an unsettled savepoint rolls back when dropped"]
pub struct Savepoint<'s> {
    session: &'s Session,
    name: String,
    settled: bool,
}

impl<'s> Savepoint<'s> {
    pub(crate) fn new(session: &'s Session, name: String) -> Self {
        Self {
            session,
            name,
            settled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flushes and releases the savepoint; the parent transaction stays open.
    ///
    /// A failed release rolls the savepoint back.
    pub fn commit(mut self) -> StoreResult<()> {
        self.settled = true;
        let released = self.session.release_savepoint(&self.name);
        if released.is_err() {
            self.rollback_quietly();
        }
        released
    }

    /// Discards everything written since the savepoint began.
    pub fn rollback(mut self) -> StoreResult<()> {
        self.settled = true;
        self.session.rollback_to_savepoint(&self.name)
    }

    fn rollback_quietly(&self) {
        if let Err(err) = self.session.rollback_to_savepoint(&self.name) {
            error!(
                "event=savepoint_rollback module=session status=error session={} savepoint={} error={}",
                self.session.id(),
                self.name,
                err
            );
        }
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.rollback_quietly();
        }
    }
}

/// A logical boundary sharing its parent's real transaction.
///
/// Rolling it back rolls back the whole session transaction and leaves the
/// session inactive until the owner of the outer transaction rolls back.
#[must_use = "an unsettled subtransaction rolls back when dropped"]
pub struct Subtransaction<'s> {
    session: &'s Session,
    settled: bool,
}

impl<'s> Subtransaction<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            settled: false,
        }
    }

    /// Ends the boundary; nothing is persisted until the outer commit.
    ///
    /// Fails with `InactiveTransaction` when an inner subtransaction already
    /// rolled the parent back.
    pub fn commit(mut self) -> StoreResult<()> {
        self.settled = true;
        self.session.end_subtransaction()
    }

    pub fn rollback(mut self) -> StoreResult<()> {
        self.settled = true;
        self.session.rollback_subtransaction()
    }
}

impl Drop for Subtransaction<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.session.rollback_subtransaction() {
            error!(
                "event=subtransaction_drop module=session status=error session={} error={}",
                self.session.id(),
                err
            );
        }
    }
}
