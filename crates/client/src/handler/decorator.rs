//! Building handler chains out of decorators.
//!
//! A [`Decorator`] turns a handler into another handler that wraps it.
//! Decorators compose with [`DecoratorExt::and_then`] from the innermost to the
//! outermost stage, and the composed decorator is applied to the terminal
//! handler once.

use crate::handler::{DelegatingHandler, HttpMessageHandler, MessageProcessingHandler, MessageProcessor};

pub trait Decorator<In> {
    type Out;

    fn decorate(&self, raw: In) -> Self::Out;
}

/// Composition of handler decorators.
pub trait DecoratorExt: Decorator<Box<dyn HttpMessageHandler>> + Sized {
    /// `decorator` wraps whatever `self` produced.
    fn and_then<D>(self, decorator: D) -> DecoratorComposer<Self, D> {
        DecoratorComposer::new(self, decorator)
    }

    /// `self` wraps whatever `decorator` produced.
    fn compose<D>(self, decorator: D) -> DecoratorComposer<D, Self> {
        DecoratorComposer::new(decorator, self)
    }
}

impl<T: Decorator<Box<dyn HttpMessageHandler>>> DecoratorExt for T {}

/// Applies `decorator_1`, then `decorator_2` to its output.
#[derive(Debug, Clone, Copy)]
pub struct DecoratorComposer<D1, D2> {
    decorator_1: D1,
    decorator_2: D2,
}

impl<D1, D2> DecoratorComposer<D1, D2> {
    pub fn new(decorator_1: D1, decorator_2: D2) -> Self {
        Self { decorator_1, decorator_2 }
    }
}

impl Default for DecoratorComposer<IdentityDecorator, IdentityDecorator> {
    fn default() -> Self {
        Self::new(IdentityDecorator, IdentityDecorator)
    }
}

impl<In, D1, D2> Decorator<In> for DecoratorComposer<D1, D2>
where
    D1: Decorator<In>,
    D2: Decorator<D1::Out>,
{
    type Out = D2::Out;

    fn decorate(&self, raw: In) -> Self::Out {
        let output_1 = self.decorator_1.decorate(raw);
        self.decorator_2.decorate(output_1)
    }
}

#[derive(Default, Clone, Copy, Debug)]
pub struct IdentityDecorator;

impl<In> Decorator<In> for IdentityDecorator {
    type Out = In;

    #[inline(always)]
    fn decorate(&self, raw: In) -> Self::Out {
        raw
    }
}

/// Wraps a handler in a plain [`DelegatingHandler`].
#[derive(Default, Clone, Copy, Debug)]
pub struct DelegatingDecorator;

impl<H: HttpMessageHandler + 'static> Decorator<H> for DelegatingDecorator {
    type Out = DelegatingHandler;

    fn decorate(&self, raw: H) -> Self::Out {
        DelegatingHandler::with_inner(raw)
    }
}

/// Wraps a handler in a [`MessageProcessingHandler`] running a clone of `processor`.
#[derive(Default, Clone, Copy, Debug)]
pub struct ProcessingDecorator<P> {
    processor: P,
}

impl<P> ProcessingDecorator<P> {
    pub fn new(processor: P) -> Self {
        Self { processor }
    }
}

impl<H, P> Decorator<H> for ProcessingDecorator<P>
where
    H: HttpMessageHandler + 'static,
    P: MessageProcessor + Clone,
{
    type Out = MessageProcessingHandler<P>;

    fn decorate(&self, raw: H) -> Self::Out {
        MessageProcessingHandler::new(self.processor.clone(), raw)
    }
}
