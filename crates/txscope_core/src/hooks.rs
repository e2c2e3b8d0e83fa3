//! Request lifecycle hooks invoked by the hosting request pipeline.
//!
//! # Invariants
//! - Neither hook ever returns an error or panics on store failures.
//! - Both hooks remove the scope's shared session and atomic stack.

use crate::factory::SessionFactory;
use log::{error, info, warn};

/// The response-side view the hooks need.
pub trait Outcome {
    /// True for client or server errors; the scope is rolled back.
    fn is_failure(&self) -> bool;

    /// Outcome reported when settling the scope itself fails.
    fn internal_error() -> Self
    where
        Self: Sized;
}

/// An HTTP-like status code outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOutcome {
    pub status: u16,
}

impl StatusOutcome {
    pub const OK: Self = Self { status: 200 };
    pub const INTERNAL_ERROR: Self = Self { status: 500 };

    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

impl Outcome for StatusOutcome {
    fn is_failure(&self) -> bool {
        self.status >= 400
    }

    fn internal_error() -> Self {
        Self::INTERNAL_ERROR
    }
}

/// Settles the scope's shared session at response time.
///
/// Failure outcomes roll back and are returned unchanged; others commit.
/// Any commit or rollback error is logged and turned into
/// [`Outcome::internal_error`].
pub fn finalize<O: Outcome>(factory: &SessionFactory, outcome: O) -> O {
    let failure = outcome.is_failure();
    let settled = factory.shared_store().and_then(|shared| match shared {
        Some(session) if failure => session.rollback(),
        Some(session) => {
            let committed = session.commit();
            if committed.is_err() {
                if let Err(err) = session.rollback() {
                    error!(
                        "event=finalize module=hooks status=error stage=rollback session={} error={}",
                        session.id(),
                        err
                    );
                }
            }
            committed
        }
        None => Ok(()),
    });

    let outcome = match settled {
        Ok(()) => {
            info!(
                "event=finalize module=hooks status=ok action={}",
                if failure { "rollback" } else { "commit" }
            );
            outcome
        }
        Err(err) => {
            error!(
                "event=finalize module=hooks status=error action={} error={}",
                if failure { "rollback" } else { "commit" },
                err
            );
            O::internal_error()
        }
    };

    remove_scope(factory, "finalize");
    outcome
}

/// Discards the scope's sessions after an unhandled error during teardown.
pub fn cleanup(factory: &SessionFactory, cause: Option<&dyn std::error::Error>) {
    match cause {
        Some(cause) => warn!(
            "event=cleanup module=hooks status=degraded cause={}",
            cause
        ),
        None => info!("event=cleanup module=hooks status=ok"),
    }
    remove_scope(factory, "cleanup");
}

fn remove_scope(factory: &SessionFactory, hook: &str) {
    match factory.atomic_stack() {
        Ok(stack) if !stack.is_empty() => warn!(
            "event={} module=hooks status=degraded reason=leaked_atomic_sessions count={}",
            hook,
            stack.len()
        ),
        Ok(_) => {}
        Err(err) => error!(
            "event={} module=hooks status=error stage=inspect error={}",
            hook, err
        ),
    }
    if let Err(err) = factory.remove(false) {
        error!(
            "event={} module=hooks status=error stage=remove error={}",
            hook, err
        );
    }
}
