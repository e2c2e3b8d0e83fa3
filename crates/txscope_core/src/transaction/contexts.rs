use crate::error::StoreResult;
use crate::factory::SessionFactory;
use crate::session::{SessionHandle, SessionOptions};
use log::{error, info};
use std::sync::Arc;

/// An atomic session pushed onto the current scope for the guard's lifetime.
///
/// Settle it with [`AtomicContext::commit`] or [`AtomicContext::rollback`];
/// dropping it unsettled rolls back. The session is popped from the scope in
/// every case.
#[must_use = "an unsettled atomic context rolls back when dropped"]
pub struct AtomicContext<'f> {
    factory: &'f SessionFactory,
    session: SessionHandle,
    kind: &'static str,
    settled: bool,
}

impl<'f> AtomicContext<'f> {
    pub(crate) fn enter(factory: &'f SessionFactory, options: SessionOptions) -> StoreResult<Self> {
        Self::enter_as(factory, options, "atomic")
    }

    fn enter_as(
        factory: &'f SessionFactory,
        options: SessionOptions,
        kind: &'static str,
    ) -> StoreResult<Self> {
        let session = factory.get_atomic_store(options);
        factory.push_atomic(Arc::clone(&session))?;
        Ok(Self {
            factory,
            session,
            kind,
            settled: false,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Commits the atomic session; a failed commit is rolled back.
    pub fn commit(mut self) -> StoreResult<()> {
        self.settled = true;
        match self.session.commit() {
            Ok(()) => {
                info!(
                    "event={}_commit module=transaction status=ok session={}",
                    self.kind,
                    self.session.id()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event={}_commit module=transaction status=error session={} error={}",
                    self.kind,
                    self.session.id(),
                    err
                );
                self.rollback_quietly();
                Err(err)
            }
        }
    }

    pub fn rollback(mut self) -> StoreResult<()> {
        self.settled = true;
        let result = self.session.rollback();
        match &result {
            Ok(()) => info!(
                "event={}_rollback module=transaction status=ok session={}",
                self.kind,
                self.session.id()
            ),
            Err(err) => error!(
                "event={}_rollback module=transaction status=error session={} error={}",
                self.kind,
                self.session.id(),
                err
            ),
        }
        result
    }

    fn rollback_quietly(&self) {
        if let Err(err) = self.session.rollback() {
            error!(
                "event={}_rollback module=transaction status=error session={} error={}",
                self.kind,
                self.session.id(),
                err
            );
        }
    }
}

impl Drop for AtomicContext<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.rollback_quietly();
        }
        if let Err(err) = self.factory.pop_atomic(&self.session) {
            error!(
                "event={}_remove module=transaction status=error session={} error={}",
                self.kind,
                self.session.id(),
                err
            );
        }
    }
}

/// An atomic session that is always rolled back, for side-effect-free work.
#[must_use = "a transient context rolls back when dropped"]
pub struct TransientContext<'f> {
    inner: AtomicContext<'f>,
}

impl<'f> TransientContext<'f> {
    pub(crate) fn enter(factory: &'f SessionFactory) -> StoreResult<Self> {
        Ok(Self {
            inner: AtomicContext::enter_as(factory, SessionOptions::atomic(), "transient")?,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        self.inner.session()
    }

    /// Rolls back everything done through the session.
    pub fn finish(self) -> StoreResult<()> {
        self.inner.rollback()
    }
}
