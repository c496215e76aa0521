//! Handler and middleware composition.
//!
//! # Responsibilities
//! - Define the universal handler signature
//! - Build onion-ordered middleware chains
//!
//! # Design Decisions
//! - Handlers borrow the request and response for the duration of the call
//! - A middleware is a plain function from handler to handler, so it may call
//!   the next handler zero, one or many times
//! - In a middleware list the first element is the outermost layer

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::transport::{Request, Response};

/// Boxed `Send` future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Processes one call.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a mut dyn Request, resp: &'a mut dyn Response) -> BoxFuture<'a, Result<()>>;
}

/// Shared handler value.
pub type BoxHandler = Arc<dyn Handler>;

/// Wraps a handler into another handler.
pub type Middleware = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Handler backed by a closure, see [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut dyn Request, &'a mut dyn Response) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut dyn Request, resp: &'a mut dyn Response) -> BoxFuture<'a, Result<()>> {
        (self.f)(req, resp)
    }
}

/// Handler from a closure returning a boxed future.
///
/// ```ignore
/// let hello = handler_fn(|req, resp| Box::pin(async move {
///     resp.write_data(req, &Data("hello"));
///     Ok(())
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> BoxHandler
where
    F: for<'a> Fn(&'a mut dyn Request, &'a mut dyn Response) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(HandlerFn { f })
}

pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps `handler` so that `middlewares[0]` runs first.
pub fn chain(handler: BoxHandler, middlewares: &[Middleware]) -> BoxHandler {
    middlewares.iter().rev().fold(handler, |next, middleware| middleware(next))
}

/// Single middleware equivalent to `outer` wrapping `others` in order.
pub fn compose(outer: Middleware, others: Vec<Middleware>) -> Middleware {
    Arc::new(move |next: BoxHandler| outer(chain(next, &others)))
}
