use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::HttpError;
use crate::handler::{HttpMessageHandler, Lifecycle};
use crate::helpers::with_cancellation;
use crate::message::{HttpRequestMessage, HttpResponseMessage};

/// A handler that forwards every send to the handler it owns.
///
/// The inner handler can only be replaced before the first send, and the send
/// resolves as canceled as soon as the token fires, whether or not the inner
/// handler watches it.
pub struct DelegatingHandler {
    inner: Option<Box<dyn HttpMessageHandler>>,
    lifecycle: Lifecycle,
}

impl Default for DelegatingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DelegatingHandler {
    /// A handler without an inner handler yet. Sending through it fails until
    /// one is set.
    pub fn new() -> Self {
        Self { inner: None, lifecycle: Lifecycle::new("DelegatingHandler") }
    }

    pub fn with_inner(inner: impl HttpMessageHandler + 'static) -> Self {
        Self { inner: Some(Box::new(inner)), ..Self::new() }
    }

    pub fn inner_handler(&self) -> Option<&dyn HttpMessageHandler> {
        self.inner.as_deref()
    }

    pub fn set_inner_handler(&mut self, inner: Option<Box<dyn HttpMessageHandler>>) -> Result<(), HttpError> {
        let inner = inner.ok_or(HttpError::argument_null("inner_handler"))?;
        self.lifecycle.check_configurable()?;
        self.inner = Some(inner);
        Ok(())
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

#[async_trait]
impl HttpMessageHandler for DelegatingHandler {
    async fn send(
        &self,
        request: HttpRequestMessage,
        cancel: CancellationToken,
    ) -> Result<HttpResponseMessage, HttpError> {
        self.lifecycle.start_sending()?;
        let inner =
            self.inner.as_deref().ok_or_else(|| HttpError::invalid_operation("the inner handler has not been assigned"))?;

        trace!(method = %request.method(), uri = %request.uri(), "delegating request");
        with_cancellation(&cancel, inner.send(request, cancel.clone())).await
    }

    fn dispose(&self) {
        if self.lifecycle.dispose() {
            if let Some(inner) = &self.inner {
                inner.dispose();
            }
        }
    }
}

impl fmt::Debug for DelegatingHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatingHandler")
            .field("has_inner", &self.inner.is_some())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
