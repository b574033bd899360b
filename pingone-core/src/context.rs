//! Operation context - deadline and cancellation for one host operation

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Returned when a wait was interrupted by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Deadline and cancellation signal the host attaches to one operation.
///
/// Cloning is cheap; all clones observe the same cancellation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    started: Instant,
    timeout: Duration,
    cancel: watch::Receiver<bool>,
}

/// Handle held by the host to cancel an in-flight operation
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl OperationContext {
    /// Context with a deadline `timeout` from now and a handle to cancel it
    pub fn new(timeout: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            started: Instant::now(),
            timeout,
            cancel: rx,
        };
        (ctx, CancelHandle(tx))
    }

    /// Context that can only end by its deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout).0
    }

    /// Same cancellation signal, different total timeout measured from the
    /// original start
    pub fn with_total_timeout(&self, timeout: Duration) -> Self {
        Self {
            started: self.started,
            timeout,
            cancel: self.cancel.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Instant {
        self.started + self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the deadline, zero once it passed
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the operation is cancelled; never resolves when the
    /// cancel handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration` unless cancelled first
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down_to_zero() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(10));
        assert_eq!(ctx.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(ctx.remaining(), Duration::from_secs(6));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_cancel() {
        let (ctx, handle) = OperationContext::new(Duration::from_secs(600));
        let sleeper = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.sleep(Duration::from_secs(300)).await })
        };

        tokio::time::advance(Duration::from_secs(1)).await;
        handle.cancel();

        assert_eq!(sleeper.await.unwrap(), Err(Cancelled));
        assert!(ctx.is_cancelled());
        assert!(ctx.elapsed() < Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.sleep(Duration::from_secs(5)).await, Ok(()));
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn total_timeout_keeps_start() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));
        let longer = ctx.with_total_timeout(Duration::from_secs(1200));
        assert_eq!(longer.deadline(), ctx.deadline() + Duration::from_secs(1140));
    }
}
