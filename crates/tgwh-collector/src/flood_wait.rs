//! Wait-and-resume handling for source flood-wait signals.
//!
//! A flood wait is not a failure: the source tells us how long to pause and
//! the same request is issued again afterwards. Each channel gets a bounded
//! number of waits; running out is reported as
//! [`SourceError::FloodWaitExhausted`] and treated like a network failure.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SourceError;

/// Per-channel flood-wait allowance.
#[derive(Debug, Clone)]
pub(crate) struct FloodWaitBudget {
    max_waits: u32,
    max_wait_secs: u64,
    /// Seconds actually slept, one entry per wait.
    pub(crate) waits: Vec<u64>,
}

impl FloodWaitBudget {
    pub(crate) fn new(max_waits: u32, max_wait_secs: u64) -> Self {
        Self {
            max_waits,
            max_wait_secs,
            waits: Vec::new(),
        }
    }

    fn used(&self) -> u32 {
        u32::try_from(self.waits.len()).unwrap_or(u32::MAX)
    }
}

/// Outcome of an operation that may have been interrupted while waiting.
#[derive(Debug)]
pub(crate) enum Attempt<T> {
    Done(T),
    Cancelled,
}

/// Sleep for `duration` unless `cancel` fires first. Returns `false` when cancelled.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        return true;
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Runs `operation`, sleeping and re-issuing it whenever the source answers
/// with a flood wait.
///
/// Waits are capped at the budget's `max_wait_secs`. Other errors are
/// returned immediately.
pub(crate) async fn with_flood_wait<T, F, Fut>(
    budget: &mut FloodWaitBudget,
    cancel: &CancellationToken,
    channel: &str,
    mut operation: F,
) -> Result<Attempt<T>, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(Attempt::Cancelled);
        }

        let seconds = match operation().await {
            Ok(value) => return Ok(Attempt::Done(value)),
            Err(SourceError::FloodWait { seconds }) => seconds,
            Err(err) => return Err(err),
        };

        if budget.used() >= budget.max_waits {
            return Err(SourceError::FloodWaitExhausted {
                waits: budget.used(),
            });
        }

        let wait_secs = seconds.min(budget.max_wait_secs);
        budget.waits.push(wait_secs);
        tracing::warn!(
            channel,
            requested_secs = seconds,
            wait_secs,
            wait = budget.used(),
            max_waits = budget.max_waits,
            "flood wait from source, pausing before resuming"
        );

        if !pause(Duration::from_secs(wait_secs), cancel).await {
            return Ok(Attempt::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_immediately_without_waiting() {
        let mut budget = FloodWaitBudget::new(3, 10);
        let cancel = CancellationToken::new();
        let result = with_flood_wait(&mut budget, &cancel, "test", || async {
            Ok::<u32, SourceError>(42)
        })
        .await
        .unwrap();
        assert!(matches!(result, Attempt::Done(42)));
        assert!(budget.waits.is_empty());
    }

    #[tokio::test]
    async fn resumes_after_flood_wait() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let mut budget = FloodWaitBudget::new(3, 10);
        let cancel = CancellationToken::new();

        let result = with_flood_wait(&mut budget, &cancel, "test", || {
            let cc = Arc::clone(&cc);
            async move {
                if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SourceError::FloodWait { seconds: 0 })
                } else {
                    Ok::<u32, SourceError>(7)
                }
            }
        })
        .await
        .unwrap();

        assert!(matches!(result, Attempt::Done(7)));
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        assert_eq!(budget.waits, vec![0, 0]);
    }

    #[tokio::test]
    async fn caps_wait_at_budget_maximum() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let mut budget = FloodWaitBudget::new(1, 0);
        let cancel = CancellationToken::new();

        with_flood_wait(&mut budget, &cancel, "test", || {
            let cc = Arc::clone(&cc);
            async move {
                if cc.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SourceError::FloodWait { seconds: 3600 })
                } else {
                    Ok::<(), SourceError>(())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(budget.waits, vec![0]);
    }

    #[tokio::test]
    async fn exhausted_budget_is_an_error() {
        let mut budget = FloodWaitBudget::new(2, 0);
        let cancel = CancellationToken::new();
        let err = with_flood_wait(&mut budget, &cancel, "test", || async {
            Err::<(), SourceError>(SourceError::FloodWait { seconds: 5 })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SourceError::FloodWaitExhausted { waits: 2 }));
    }

    #[tokio::test]
    async fn does_not_retry_other_errors() {
        let call_count = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&call_count);
        let mut budget = FloodWaitBudget::new(3, 10);
        let cancel = CancellationToken::new();

        let err = with_flood_wait(&mut budget, &cancel, "test", || {
            let cc = Arc::clone(&cc);
            async move {
                cc.fetch_add(1, Ordering::SeqCst);
                Err::<(), SourceError>(SourceError::ChannelPrivate {
                    channel: "@secret".to_owned(),
                })
            }
        })
        .await
        .unwrap_err();

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(err.is_access_error());
    }

    #[tokio::test]
    async fn cancellation_interrupts_wait() {
        let mut budget = FloodWaitBudget::new(3, 600);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = with_flood_wait(&mut budget, &cancel, "test", || async {
            Err::<(), SourceError>(SourceError::FloodWait { seconds: 600 })
        })
        .await
        .unwrap();

        assert!(matches!(result, Attempt::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
