use std::time::Duration;

use micro_transport::native::AbortHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transport::TimeoutManager;

/// What one send owns while its native exchange is in flight: the abort
/// handle, the registration of the caller's token and the watchdog.
///
/// Dropping the state unregisters both, so nothing outlives the send.
#[derive(Debug)]
pub(crate) struct RequestState {
    abort: AbortHandle,
    cancel_registration: JoinHandle<()>,
    timeout: TimeoutManager,
}

impl RequestState {
    pub(crate) fn register(abort: AbortHandle, cancel: &CancellationToken, timeout: Duration) -> Self {
        let token = cancel.clone();
        let on_cancel = abort.clone();
        let cancel_registration = tokio::spawn(async move {
            token.cancelled().await;
            if on_cancel.abort() {
                debug!("caller canceled, abort native exchange");
            }
        });

        let timeout = TimeoutManager::start(abort.clone(), timeout);
        Self { abort, cancel_registration, timeout }
    }

    pub(crate) fn abort_handle(&self) -> &AbortHandle {
        &self.abort
    }

    pub(crate) fn is_timed_out(&self) -> bool {
        self.timeout.is_expired()
    }
}

impl Drop for RequestState {
    fn drop(&mut self) {
        self.cancel_registration.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caller_cancellation_aborts() {
        let cancel = CancellationToken::new();
        let state = RequestState::register(AbortHandle::new(), &cancel, Duration::from_secs(60));

        cancel.cancel();
        state.abort_handle().aborted().await;
        assert!(state.abort_handle().is_aborted());
        assert!(!state.is_timed_out());
    }

    #[tokio::test]
    async fn dropped_state_ignores_cancellation() {
        let cancel = CancellationToken::new();
        let abort = AbortHandle::new();
        drop(RequestState::register(abort.clone(), &cancel, Duration::from_secs(60)));

        cancel.cancel();
        tokio::task::yield_now().await;
        assert!(!abort.is_aborted());
    }
}
