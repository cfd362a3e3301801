use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use micro_transport::native::AbortHandle;
use tokio::task::JoinHandle;
use tracing::warn;

/// Default watchdog duration of a send.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// A one-shot watchdog over one native exchange.
///
/// When the timer fires before the exchange completed, the exchange is
/// aborted. Dropping the manager cancels the pending timer.
#[derive(Debug)]
pub struct TimeoutManager {
    timer: JoinHandle<()>,
    expired: Arc<AtomicBool>,
}

impl TimeoutManager {
    /// Starts the timer. Must be called within a tokio runtime.
    pub fn start(abort: AbortHandle, timeout: Duration) -> Self {
        let expired = Arc::new(AtomicBool::new(false));
        let timer_expired = Arc::clone(&expired);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if abort.is_completed() {
                return;
            }
            warn!(timeout_ms = timeout.as_millis(), "request timed out, abort native exchange");
            timer_expired.store(true, Ordering::Release);
            abort.abort();
        });
        Self { timer, expired }
    }

    /// True once the timer fired on an exchange that had not completed.
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    /// Cancels the pending timer.
    pub fn dispose(self) {}
}

impl Drop for TimeoutManager {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn aborts_pending_exchange() {
        let abort = AbortHandle::new();
        let manager = TimeoutManager::start(abort.clone(), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!abort.is_aborted());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(abort.is_aborted());
        assert!(manager.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn disposed_timer_never_fires() {
        let abort = AbortHandle::new();
        let manager = TimeoutManager::start(abort.clone(), Duration::from_secs(1));
        manager.dispose();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!abort.is_aborted());
    }
}
