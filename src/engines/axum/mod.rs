//! Adapter for axum routers.
//!
//! # Responsibilities
//! - Register universal handlers on an `axum::Router` (`/users/{id}`)
//! - Install global middlewares in axum's own middleware slot
//! - Bridge tower layers into universal middleware
//!
//! # Design Decisions
//! - Global middlewares wrap the whole router through `axum::middleware::from_fn`,
//!   so they also run for routes the caller added to the router directly
//! - The call context travels in request extensions between the global slot
//!   and the route handler

mod adapter;

pub use adapter::AxumRequest;

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::task::Poll;

use ::axum::extract::Request as NativeRequest;
use ::axum::middleware::Next;
use ::axum::response::Response as NativeResponse;
use ::axum::routing::{on, MethodFilter, MethodRouter};
use ::axum::Router;
use bytes::Bytes;
use http::Method;
use http_body_util::BodyExt;
use tower::{Layer, Service, ServiceExt};
use tracing::info;

use super::RouteTable;
use crate::error::{BoxError, Error, Result};
use crate::handler::{chain, handler_fn, middleware_fn, BoxFuture, BoxHandler, Middleware};
use crate::transport::{copy_native, Options, Transport};

/// Route registry targeting an axum router.
pub struct AxumTransport {
    router: Router,
    routes: RouteTable,
    middlewares: Vec<Middleware>,
    options: Options,
}

impl Default for AxumTransport {
    fn default() -> Self {
        Self::new(Router::new())
    }
}

impl AxumTransport {
    /// Adapter registering onto an existing router.
    pub fn new(router: Router) -> Self {
        Self {
            router,
            routes: RouteTable::default(),
            middlewares: Vec::new(),
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Builds the router with every registered route and global middleware.
    pub fn into_router(self) -> Result<Router> {
        let route_count = self.routes.len();
        let mut router = self.router;

        for compiled in self.routes.compile(&[])? {
            let mut method_router: Option<MethodRouter> = None;

            for (method, handler) in compiled.methods {
                let filter = MethodFilter::try_from(method).map_err(|e| Error::Route {
                    path: compiled.path.clone(),
                    reason: e.to_string(),
                })?;

                let options = self.options.clone();
                let endpoint = move |req: NativeRequest| {
                    let handler = Arc::clone(&handler);
                    let options = options.clone();
                    async move { adapter::dispatch(&*handler, &options, req).await }
                };
                method_router = Some(match method_router {
                    Some(existing) => existing.on(filter, endpoint),
                    None => on(filter, endpoint),
                });
            }

            if let Some(method_router) = method_router {
                router = router.route(&compiled.path, method_router);
            }
        }

        if !self.middlewares.is_empty() {
            let globals = Arc::new(self.middlewares);
            let options = self.options.clone();
            router = router.layer(::axum::middleware::from_fn(move |req: NativeRequest, next: Next| {
                let globals = Arc::clone(&globals);
                let options = options.clone();
                async move { through_globals(&globals, &options, req, next).await }
            }));
        }

        info!(routes = route_count, "axum router built");
        Ok(router)
    }
}

impl Transport for AxumTransport {
    fn add_route(&mut self, method: Method, path: &str, handler: BoxHandler, middlewares: Vec<Middleware>) {
        self.routes.push(method, path, handler, middlewares);
    }

    /// Registers middlewares in axum's own middleware slot.
    ///
    /// The rest of the router runs as axum's `Next`, which can be called only
    /// once per request: a global middleware that calls its next handler a
    /// second time gets [`Error::Bridge`]. Route middlewares have no such limit.
    fn use_middleware(&mut self, middlewares: Vec<Middleware>) {
        self.middlewares.extend(middlewares);
    }
}

/// Runs the global middlewares with axum's `next` as the innermost handler.
async fn through_globals(globals: &[Middleware], options: &Options, req: NativeRequest, next: Next) -> NativeResponse {
    // `next` is consumed by the first call only.
    let next = Arc::new(Mutex::new(Some(next)));
    let innermost = handler_fn(move |req, resp| {
        let next = Arc::clone(&next);
        Box::pin(async move {
            let ctx = req.context().clone();
            let native = req
                .as_any_mut()
                .downcast_mut::<AxumRequest>()
                .ok_or_else(|| Error::Bridge("axum middleware slot received a non-axum request".into()))?
                .take_native(ctx);
            let next = next
                .lock()
                .ok()
                .and_then(|mut slot| slot.take())
                .ok_or_else(|| Error::Bridge("axum next handler already consumed".into()))?;

            let out = next.run(native).await;
            let (parts, body) = out.into_parts();
            let bytes = body.collect().await.map_err(|e| Error::Body(Box::new(e)))?.to_bytes();
            copy_native(resp, parts.status, &parts.headers, &bytes);
            Ok(())
        })
    });

    let handler = chain(innermost, globals);
    adapter::dispatch(&*handler, options, req).await
}

/// Service handed to bridged tower layers; calls back into the universal chain.
#[derive(Clone)]
pub struct Bridge {
    next: BoxHandler,
    options: Options,
}

impl Service<NativeRequest> for Bridge {
    type Response = NativeResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<NativeResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: NativeRequest) -> Self::Future {
        let bridge = self.clone();
        Box::pin(async move { Ok(adapter::dispatch(&*bridge.next, &bridge.options, req).await) })
    }
}

/// Runs a tower layer as universal middleware on the axum adapter.
pub fn from_layer<L, B>(layer: L) -> Middleware
where
    L: Layer<Bridge> + Send + Sync + 'static,
    L::Service: Service<NativeRequest, Response = http::Response<B>> + Send + 'static,
    <L::Service as Service<NativeRequest>>::Future: Send,
    <L::Service as Service<NativeRequest>>::Error: Into<BoxError>,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let layer = Arc::new(layer);
    middleware_fn(move |next| {
        let layer = Arc::clone(&layer);
        handler_fn(move |req, resp| {
            let layer = Arc::clone(&layer);
            let next = Arc::clone(&next);
            Box::pin(async move {
                let ctx = req.context().clone();
                let axum_req = req
                    .as_any_mut()
                    .downcast_mut::<AxumRequest>()
                    .ok_or_else(|| Error::Bridge("tower layer bridged onto a non-axum request".into()))?;
                let options = axum_req.options().clone();
                let native = axum_req.take_native(ctx);

                let out = layer
                    .layer(Bridge { next, options })
                    .oneshot(native)
                    .await
                    .map_err(|e| Error::Other(e.into()))?;

                let (parts, body) = out.into_parts();
                let bytes = body.collect().await.map_err(|e| Error::Body(e.into()))?.to_bytes();
                copy_native(resp, parts.status, &parts.headers, &bytes);
                Ok(())
            })
        })
    })
}
