use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::HttpError;
use crate::handler::{DelegatingHandler, HttpMessageHandler, Lifecycle};
use crate::helpers::fault_or_canceled;
use crate::message::{HttpRequestMessage, HttpResponseMessage};

/// Transforms run around the forwarded send of a [`MessageProcessingHandler`].
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Runs before the request is forwarded.
    async fn process_request(
        &self,
        request: HttpRequestMessage,
        cancel: &CancellationToken,
    ) -> Result<HttpRequestMessage, HttpError>;

    /// Runs once the inner handler produced a response.
    async fn process_response(
        &self,
        response: HttpResponseMessage,
        cancel: &CancellationToken,
    ) -> Result<HttpResponseMessage, HttpError>;
}

/// A delegating handler running a [`MessageProcessor`] on the way in and out.
///
/// A processor failing with [`HttpError::Canceled`] cancels the send only when
/// the caller's token was canceled. Otherwise the cancellation is reported as a
/// request error. Failures of the inner handler pass through unchanged.
pub struct MessageProcessingHandler<P> {
    processor: P,
    delegating: DelegatingHandler,
}

impl<P: MessageProcessor> MessageProcessingHandler<P> {
    pub fn new(processor: P, inner: impl HttpMessageHandler + 'static) -> Self {
        Self { processor, delegating: DelegatingHandler::with_inner(inner) }
    }

    /// A handler whose inner handler is set later with
    /// [`set_inner_handler`](Self::set_inner_handler).
    pub fn without_inner(processor: P) -> Self {
        Self { processor, delegating: DelegatingHandler::new() }
    }

    pub fn set_inner_handler(&mut self, inner: Option<Box<dyn HttpMessageHandler>>) -> Result<(), HttpError> {
        self.delegating.set_inner_handler(inner)
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        self.delegating.lifecycle()
    }
}

#[async_trait]
impl<P: MessageProcessor> HttpMessageHandler for MessageProcessingHandler<P> {
    async fn send(
        &self,
        request: HttpRequestMessage,
        cancel: CancellationToken,
    ) -> Result<HttpResponseMessage, HttpError> {
        self.lifecycle().check_not_disposed()?;

        let request =
            self.processor.process_request(request, &cancel).await.map_err(|e| fault_or_canceled(e, &cancel))?;
        let response = self.delegating.send(request, cancel.clone()).await?;
        self.processor.process_response(response, &cancel).await.map_err(|e| fault_or_canceled(e, &cancel))
    }

    fn dispose(&self) {
        self.delegating.dispose();
    }
}

impl<P> fmt::Debug for MessageProcessingHandler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageProcessingHandler").field("delegating", &self.delegating).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MockHttpMessageHandler;
    use http::header::USER_AGENT;
    use http::{HeaderValue, StatusCode, Uri};

    #[derive(Clone, Copy)]
    enum Mode {
        Pass,
        CancelRequest,
        FailResponse,
    }

    struct Processor(Mode);

    #[async_trait]
    impl MessageProcessor for Processor {
        async fn process_request(
            &self,
            mut request: HttpRequestMessage,
            _cancel: &CancellationToken,
        ) -> Result<HttpRequestMessage, HttpError> {
            if let Mode::CancelRequest = self.0 {
                return Err(HttpError::Canceled);
            }
            request.headers_mut().insert(USER_AGENT, HeaderValue::from_static("micro-client"));
            Ok(request)
        }

        async fn process_response(
            &self,
            mut response: HttpResponseMessage,
            _cancel: &CancellationToken,
        ) -> Result<HttpResponseMessage, HttpError> {
            if let Mode::FailResponse = self.0 {
                return Err(HttpError::invalid_operation("bad response"));
            }
            response.set_reason_phrase(Some("Processed".to_string()));
            Ok(response)
        }
    }

    fn request() -> HttpRequestMessage {
        HttpRequestMessage::get(Uri::from_static("http://example.com/"))
    }

    #[tokio::test]
    async fn processes_both_directions() {
        let mut inner = MockHttpMessageHandler::new();
        inner
            .expect_send()
            .withf(|request, _| request.headers().get(USER_AGENT).is_some_and(|v| v == "micro-client"))
            .returning(|_, _| Ok(HttpResponseMessage::new(StatusCode::ACCEPTED)));

        let handler = MessageProcessingHandler::new(Processor(Mode::Pass), inner);
        let response = handler.send(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.reason_phrase(), Some("Processed"));
    }

    #[tokio::test]
    async fn cancellation_depends_on_the_caller_token() {
        let mut inner = MockHttpMessageHandler::new();
        inner.expect_send().never();
        let handler = MessageProcessingHandler::new(Processor(Mode::CancelRequest), inner);

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(handler.send(request(), cancel).await.unwrap_err().is_canceled());

        let err = handler.send(request(), CancellationToken::new()).await.unwrap_err();
        assert!(err.is_request_error());
    }

    #[tokio::test]
    async fn inner_fault_passes_through() {
        let mut inner = MockHttpMessageHandler::new();
        inner.expect_send().returning(|_, _| Err(HttpError::request("connection refused")));

        let handler = MessageProcessingHandler::new(Processor(Mode::Pass), inner);
        let err = handler.send(request(), CancellationToken::new()).await.unwrap_err();
        assert!(err.is_request_error());
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn response_failure_is_a_fault() {
        let mut inner = MockHttpMessageHandler::new();
        inner.expect_send().returning(|_, _| Ok(HttpResponseMessage::new(StatusCode::OK)));

        let handler = MessageProcessingHandler::new(Processor(Mode::FailResponse), inner);
        let err = handler.send(request(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidOperation { .. }));
    }
}
