//! Adapter for poem routes.
//!
//! # Responsibilities
//! - Register universal handlers on a `poem::Route` (`/users/:id`)
//! - Bridge poem middleware into universal middleware
//!
//! # Design Decisions
//! - Global middlewares are applied around every route when the route is built
//! - Bridged poem middleware receives the native request moved out of the
//!   universal one; the call context and route parameters ride along in its
//!   extensions

mod adapter;

pub use adapter::{Entry, PoemRequest};

use std::sync::Arc;

use ::poem::{Endpoint, IntoResponse, Request as NativeRequest, Response as NativeResponse, Route, RouteMethod};
use http::Method;
use tracing::info;

use super::RouteTable;
use crate::error::{Error, Result};
use crate::handler::{handler_fn, middleware_fn, BoxHandler, Middleware};
use crate::transport::{copy_native, Options, Transport};

/// Route registry for the poem adapter.
#[derive(Default)]
pub struct PoemTransport {
    routes: RouteTable,
    middlewares: Vec<Middleware>,
    options: Options,
}

impl PoemTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Builds a poem route serving every registered handler.
    pub fn into_route(self) -> Result<Route> {
        let route_count = self.routes.len();
        let mut route = Route::new();

        for compiled in self.routes.compile(&self.middlewares)? {
            let mut methods = RouteMethod::new();
            for (method, handler) in compiled.methods {
                methods = methods.method(method, Entry::new(handler, self.options.clone(), &compiled.path));
            }
            route = route.at(compiled.path, methods);
        }

        info!(routes = route_count, "poem route built");
        Ok(route)
    }
}

impl Transport for PoemTransport {
    fn add_route(&mut self, method: Method, path: &str, handler: BoxHandler, middlewares: Vec<Middleware>) {
        self.routes.push(method, path, handler, middlewares);
    }

    fn use_middleware(&mut self, middlewares: Vec<Middleware>) {
        self.middlewares.extend(middlewares);
    }
}

/// Endpoint handed to bridged poem middleware; calls back into the universal chain.
pub struct Bridge {
    next: BoxHandler,
    options: Options,
}

impl Endpoint for Bridge {
    type Output = NativeResponse;

    async fn call(&self, req: NativeRequest) -> ::poem::Result<NativeResponse> {
        Ok(adapter::dispatch(&*self.next, &self.options, req).await)
    }
}

/// Runs a poem middleware as universal middleware on the poem adapter.
pub fn from_middleware<M>(middleware: M) -> Middleware
where
    M: ::poem::Middleware<Bridge> + Send + Sync + 'static,
{
    let middleware = Arc::new(middleware);
    middleware_fn(move |next| {
        let middleware = Arc::clone(&middleware);
        handler_fn(move |req, resp| {
            let middleware = Arc::clone(&middleware);
            let next = Arc::clone(&next);
            Box::pin(async move {
                let ctx = req.context().clone();
                let poem_req = req
                    .as_any_mut()
                    .downcast_mut::<PoemRequest>()
                    .ok_or_else(|| Error::Bridge("poem middleware bridged onto a non-poem request".into()))?;
                let options = poem_req.options().clone();
                let native = poem_req.take_native(ctx);

                let endpoint = middleware.transform(Bridge { next, options });
                let out = match endpoint.call(native).await {
                    Ok(out) => out.into_response(),
                    Err(err) => err.into_response(),
                };

                let status = out.status();
                let headers = out.headers().clone();
                let bytes = out
                    .into_body()
                    .into_bytes()
                    .await
                    .map_err(|e| Error::Body(Box::new(e)))?;
                copy_native(resp, status, &headers, &bytes);
                Ok(())
            })
        })
    })
}
