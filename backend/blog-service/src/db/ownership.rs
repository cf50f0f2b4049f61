//! Owner-scoped writes
//!
//! The primary statement filters on both target id and caller id, so a
//! non-owner's write affects zero rows just like a missing target would.
//! Only then is a disambiguating read issued, keyed by id (and parent scope)
//! alone:
//!
//! ```text
//! Attempted --row written--> Resolved(Ok)
//! Attempted --zero rows----> Disambiguating --probe--> Resolved(Err)
//! ```

use crate::error::{AppError, Result};
use std::future::Future;

/// Which owner-scoped statement produced zero rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedWriteKind {
    Update,
    Delete,
}

impl OwnedWriteKind {
    /// Map the probed owner to the precise outcome.
    ///
    /// Ownership is decided before the version: a non-owner is always
    /// `Unauthorized`, whatever version they presented.
    pub fn classify(self, probed_owner: Option<i64>, actor_id: i64) -> AppError {
        match (self, probed_owner) {
            (_, Some(owner)) if owner != actor_id => AppError::Unauthorized,
            (OwnedWriteKind::Delete, _) => AppError::NotFound,
            (OwnedWriteKind::Update, _) => AppError::EditConflict,
        }
    }
}

#[derive(Debug)]
pub enum WriteState<T> {
    Attempted(Option<T>),
    Disambiguating,
    Resolved(Result<T>),
}

/// Drive an owner-scoped write to its final outcome.
///
/// `probe` returns the owner of the target if it still exists within scope;
/// it is invoked at most once and only after a zero-row write.
pub async fn resolve_owned_write<T, P, Fut>(
    kind: OwnedWriteKind,
    actor_id: i64,
    written: Option<T>,
    probe: P,
) -> Result<T>
where
    P: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<i64>>>,
{
    let mut probe = Some(probe);
    let mut state = WriteState::Attempted(written);

    loop {
        state = match state {
            WriteState::Attempted(Some(value)) => WriteState::Resolved(Ok(value)),
            WriteState::Attempted(None) => WriteState::Disambiguating,
            WriteState::Disambiguating => {
                let owner = match probe.take() {
                    Some(probe) => probe().await?,
                    None => None,
                };
                WriteState::Resolved(Err(kind.classify(owner, actor_id)))
            }
            WriteState::Resolved(result) => return result,
        };
    }
}
