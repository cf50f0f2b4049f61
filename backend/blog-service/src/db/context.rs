//! Per-call deadline and cancellation for store round trips
//!
//! The timeout applies to each individual round trip; a multi-step
//! operation such as check-then-insert gets a fresh budget per step, capped
//! by the overall deadline when one is set.

use crate::error::{AppError, Result, TransientFailure};
use crate::metrics::record_store_call;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct StoreContext {
    timeout: Duration,
    deadline: Option<Instant>,
    cancelled: Option<watch::Receiver<bool>>,
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_TIMEOUT)
    }
}

impl StoreContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
            cancelled: None,
        }
    }

    /// Abandon in-flight calls once `cancelled` flips to `true`.
    pub fn with_cancellation(mut self, cancelled: watch::Receiver<bool>) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    /// Cap every round trip at the caller's overall deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn budget(&self) -> Duration {
        match self.deadline {
            Some(deadline) => self
                .timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.timeout,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    async fn wait_cancelled(&self) {
        match self.cancelled.clone() {
            Some(mut rx) => {
                if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                    // Sender dropped without cancelling
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Execute one store round trip under this context.
    pub async fn run<T, F>(
        &self,
        store: &'static str,
        operation: &'static str,
        call: F,
    ) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let started = std::time::Instant::now();

        let result = if self.is_cancelled() {
            Err(AppError::Store(TransientFailure::Cancelled))
        } else {
            let budget = self.budget();
            tokio::select! {
                biased;
                _ = self.wait_cancelled() => Err(AppError::Store(TransientFailure::Cancelled)),
                outcome = tokio::time::timeout(budget, call) => match outcome {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(AppError::from(err)),
                    Err(_) => Err(AppError::Store(TransientFailure::Timeout(budget))),
                },
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.outcome_label(),
        };
        record_store_call(store, operation, outcome, started.elapsed());

        if let Err(err) = &result {
            if err.is_transient() {
                tracing::warn!(store, operation, error = %err, "store round trip failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let ctx = StoreContext::new(Duration::from_millis(200));
        let value = ctx
            .run("test", "fast", async { Ok::<_, sqlx::Error>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let ctx = StoreContext::new(Duration::from_millis(10));
        let result = ctx
            .run("test", "slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, sqlx::Error>(())
            })
            .await;
        assert!(matches!(
            result,
            Err(AppError::Store(TransientFailure::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_timeout() {
        let (tx, rx) = watch::channel(false);
        let ctx = StoreContext::new(Duration::from_secs(5)).with_cancellation(rx);

        let call = ctx.run("test", "cancelled", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(())
        });
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(true).unwrap();
        };

        let (result, _) = tokio::join!(call, cancel);
        assert!(matches!(result, Err(AppError::Store(TransientFailure::Cancelled))));
    }

    #[tokio::test]
    async fn already_cancelled_context_skips_the_call() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let ctx = StoreContext::default().with_cancellation(rx);

        let result = ctx
            .run("test", "skipped", async { Ok::<_, sqlx::Error>(1) })
            .await;
        assert!(matches!(result, Err(AppError::Store(TransientFailure::Cancelled))));
    }

    #[tokio::test]
    async fn expired_deadline_caps_budget() {
        let ctx = StoreContext::new(Duration::from_secs(5)).with_deadline(Instant::now());
        let result = ctx
            .run("test", "deadline", async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, sqlx::Error>(())
            })
            .await;
        assert!(matches!(
            result,
            Err(AppError::Store(TransientFailure::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn storage_errors_are_classified() {
        let ctx = StoreContext::default();
        let result = ctx
            .run("test", "missing", async { Err::<(), _>(sqlx::Error::RowNotFound) })
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
