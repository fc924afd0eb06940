//! # Scoped Lifecycle
//!
//! [`CollectivesScope`] guarantees `finalize()` runs once `initialize()`
//! has succeeded, the same contract as Python's `with Collectives(...) as
//! c:` context manager, minus the exception swallowing. The Python
//! `__exit__` prints the traceback and returns `True`, suppressing
//! whatever was raised in the `with` block; this type does not reproduce
//! that — callers use `?` like everywhere else, and `Drop` still runs
//! during unwinding so `finalize()` is attempted regardless of how the
//! scope's block exits. That divergence is deliberate, not an oversight
//! (see `DESIGN.md`).

use std::ops::Deref;

use tracing::warn;

use super::Collectives;
use crate::error::CollectivesError;
use crate::transport::Transport;

/// RAII guard over a [`Collectives`]: `enter` calls `initialize()`, and the
/// guard's `Drop` calls `finalize()` best-effort if the caller never did so
/// explicitly via [`CollectivesScope::finalize`].
pub struct CollectivesScope<T: Transport + 'static> {
    collectives: Option<Collectives<T>>,
}

impl<T: Transport + 'static> CollectivesScope<T> {
    /// Initialize `transport` and enter the scope.
    pub async fn enter(transport: T) -> Result<Self, CollectivesError> {
        transport.initialize().await?;
        Ok(Self {
            collectives: Some(Collectives::new(transport)),
        })
    }

    /// Explicitly finalize and consume the scope. Prefer this over letting
    /// the guard drop when the caller cares about the finalize error —
    /// `Drop` can only log a failure, not propagate it.
    pub async fn finalize(mut self) -> Result<(), CollectivesError> {
        if let Some(c) = self.collectives.take() {
            c.finalize().await?;
        }
        Ok(())
    }
}

impl<T: Transport + 'static> Deref for CollectivesScope<T> {
    type Target = Collectives<T>;

    fn deref(&self) -> &Self::Target {
        self.collectives.as_ref().expect("scope entered, not yet finalized")
    }
}

impl<T: Transport + 'static> Drop for CollectivesScope<T> {
    fn drop(&mut self) {
        if let Some(c) = self.collectives.take() {
            tokio::spawn(async move {
                if let Err(e) = c.finalize().await {
                    warn!(error = %e, "collectives scope: best-effort finalize on drop failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use crate::transport::retrying::RetryingTransport;

    fn params(rank: usize, addrs: Vec<&str>) -> Params {
        Params::new(
            rank,
            addrs.len(),
            addrs.into_iter().map(String::from).collect(),
            1000,
            0.001,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn explicit_finalize_consumes_the_scope() {
        let transport = RetryingTransport::new(&params(0, vec!["127.0.0.1:21301"]));
        let scope = CollectivesScope::enter(transport).await.unwrap();
        assert_eq!(scope.transport().rank(), 0);
        scope.finalize().await.unwrap();
    }

    #[tokio::test]
    async fn drop_without_explicit_finalize_does_not_panic() {
        let transport = RetryingTransport::new(&params(0, vec!["127.0.0.1:21302"]));
        let scope = CollectivesScope::enter(transport).await.unwrap();
        drop(scope);
        tokio::task::yield_now().await;
    }
}
