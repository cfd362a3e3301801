//! The handler chain.
//!
//! Every stage of a send is an [`HttpMessageHandler`]. Decorating stages such as
//! [`DelegatingHandler`] and [`MessageProcessingHandler`] own the next stage and
//! forward to it; a terminal handler like
//! [`TransportHandler`](crate::transport::TransportHandler) talks to the network.
//! Chains are assembled with [`Decorator`]s:
//!
//! ```no_run
//! use micro_client::handler::{Decorator, DecoratorExt, IdentityDecorator, ProcessingDecorator};
//! # use micro_client::handler::MessageProcessor;
//! # fn build<P: MessageProcessor + Clone + 'static>(logging: P, auth: P) {
//! use micro_client::transport::TransportHandler;
//!
//! let chain = IdentityDecorator
//!     .and_then(ProcessingDecorator::new(logging))
//!     .and_then(ProcessingDecorator::new(auth))
//!     .decorate(TransportHandler::new());
//! # }
//! ```

mod decorator;
mod delegating;
mod processing;
mod state;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::HttpError;
use crate::message::{HttpRequestMessage, HttpResponseMessage};

pub use decorator::{
    Decorator, DecoratorComposer, DecoratorExt, DelegatingDecorator, IdentityDecorator, ProcessingDecorator,
};
pub use delegating::DelegatingHandler;
pub use processing::{MessageProcessingHandler, MessageProcessor};
pub use state::{Lifecycle, LifecycleState};

/// One stage of the send pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpMessageHandler: Send + Sync {
    /// Sends `request` and resolves to its response, an error, or
    /// [`HttpError::Canceled`] once `cancel` fired.
    async fn send(&self, request: HttpRequestMessage, cancel: CancellationToken)
    -> Result<HttpResponseMessage, HttpError>;

    /// Releases the handler and the stages it owns. Repeated calls do nothing.
    fn dispose(&self) {}
}

#[async_trait]
impl<H: HttpMessageHandler + ?Sized> HttpMessageHandler for Box<H> {
    async fn send(
        &self,
        request: HttpRequestMessage,
        cancel: CancellationToken,
    ) -> Result<HttpResponseMessage, HttpError> {
        (**self).send(request, cancel).await
    }

    fn dispose(&self) {
        (**self).dispose();
    }
}

#[async_trait]
impl<H: HttpMessageHandler + ?Sized> HttpMessageHandler for Arc<H> {
    async fn send(
        &self,
        request: HttpRequestMessage,
        cancel: CancellationToken,
    ) -> Result<HttpResponseMessage, HttpError> {
        (**self).send(request, cancel).await
    }

    fn dispose(&self) {
        (**self).dispose();
    }
}
