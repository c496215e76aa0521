//! Adapter for actix-web.
//!
//! # Responsibilities
//! - Register universal handlers on an actix-web app through a service configurator (`/users/{id}`)
//! - Snapshot actix requests into the universal contract
//! - Bridge actix middleware (`Transform`s) into universal middleware
//!
//! # Design Decisions
//! - Request bodies are buffered up to the body limit before the handler runs;
//!   a refused body fails when the handler reads it, like on the other engines
//! - Context rebinding is not supported; `with_context` keeps the original context
//! - Actix middleware is neither `Send` nor able to wrap a `Send` future, so a
//!   bridged middleware runs in a local task on the worker thread, against a
//!   `ServiceRequest` rebuilt from the snapshot. The task and the universal
//!   chain meet through oneshot channels.

mod adapter;

pub use adapter::ActixRequest;

use std::cell::RefCell;
use std::sync::Arc;
use std::task::Poll;

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, HttpRequest};
use bytes::Bytes;
use futures_util::future::LocalBoxFuture;
use http::{HeaderMap, Method, StatusCode};
use tokio::sync::oneshot;
use tracing::{debug, info};

use self::adapter::{payload_error, to_http_headers, to_native, Head};
use super::RouteTable;
use crate::error::{Error, Result};
use crate::handler::{handler_fn, middleware_fn, BoxHandler, Middleware};
use crate::transport::form::collect;
use crate::transport::{copy_native, full_body, BufferedResponse, Context, Options, PathParams, Request, Transport};

/// Route registry for the actix-web adapter.
#[derive(Default)]
pub struct ActixTransport {
    routes: RouteTable,
    middlewares: Vec<Middleware>,
    options: Options,
}

impl ActixTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Builds a configurator for `App::configure`, cloneable per worker.
    pub fn into_configurator(self) -> Result<impl Fn(&mut web::ServiceConfig) + Clone + Send + 'static> {
        let route_count = self.routes.len();
        let mut compiled_routes = Vec::new();

        for compiled in self.routes.compile(&self.middlewares)? {
            for (method, handler) in compiled.methods {
                let native_method = actix_web::http::Method::from_bytes(method.as_str().as_bytes()).map_err(|e| {
                    Error::Route {
                        path: compiled.path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                compiled_routes.push((native_method, compiled.path.clone(), handler));
            }
        }

        info!(routes = route_count, "actix configurator built");

        let routes = Arc::new(compiled_routes);
        let options = self.options;

        Ok(move |cfg: &mut web::ServiceConfig| {
            cfg.app_data(web::PayloadConfig::new(options.body_limit));
            for (method, path, handler) in routes.iter() {
                let handler = Arc::clone(handler);
                let options = options.clone();
                cfg.route(
                    path,
                    web::method(method.clone()).to(
                        move |native: HttpRequest, body: std::result::Result<Bytes, actix_web::Error>| {
                            let handler = Arc::clone(&handler);
                            let options = options.clone();
                            let body = body.map_err(|err| payload_error(&err, options.body_limit));
                            let req = ActixRequest::snapshot(&native, body, Context::background(), options.clone());
                            async move { adapter::dispatch(&*handler, &options, req).await }
                        },
                    ),
                );
            }
        })
    }
}

impl Transport for ActixTransport {
    fn add_route(&mut self, method: Method, path: &str, handler: BoxHandler, middlewares: Vec<Middleware>) {
        self.routes.push(method, path, handler, middlewares);
    }

    fn use_middleware(&mut self, middlewares: Vec<Middleware>) {
        self.middlewares.extend(middlewares);
    }
}

type Parts = (StatusCode, HeaderMap, Bytes);

/// Service handed to bridged actix middleware; calls back into the universal chain.
pub struct Synthetic {
    slot: RefCell<Option<(oneshot::Sender<Head>, oneshot::Receiver<Parts>)>>,
}

impl Service<ServiceRequest> for Synthetic {
    type Response = ServiceResponse;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, std::result::Result<ServiceResponse, actix_web::Error>>;

    fn poll_ready(&self, _cx: &mut std::task::Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let slot = self.slot.borrow_mut().take();
        Box::pin(async move {
            let (called, reply) =
                slot.ok_or_else(|| actix_web::error::ErrorInternalServerError("bridged handler already called"))?;
            // The middleware may have rewritten the request head.
            let _ = called.send(Head::of(req.request()));
            let (status, headers, body) = reply
                .await
                .map_err(|_| actix_web::error::ErrorInternalServerError("universal handler dropped"))?;
            Ok(req.into_response(to_native(status, &headers, body)))
        })
    }
}

/// Runs an actix-web middleware as universal middleware on the actix adapter.
///
/// `factory` builds the middleware on the worker thread for every call.
pub fn from_transform<F, T, B>(factory: F) -> Middleware
where
    F: Fn() -> T + Send + Sync + 'static,
    T: Transform<Synthetic, ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: MessageBody + 'static,
{
    let factory = Arc::new(factory);
    middleware_fn(move |next| {
        let factory = Arc::clone(&factory);
        handler_fn(move |req, resp| {
            let factory = Arc::clone(&factory);
            let next = Arc::clone(&next);
            Box::pin(async move {
                let ctx = req.context().clone();
                let actix_req = req
                    .as_any_mut()
                    .downcast_mut::<ActixRequest>()
                    .ok_or_else(|| Error::Bridge("actix middleware bridged onto a non-actix request".into()))?;
                let head = actix_req.head().clone();
                let params = actix_req.params();
                let options = actix_req.options().clone();
                let body = collect(actix_req.body()).await?;

                let (called_tx, mut called_rx) = oneshot::channel();
                let (reply_tx, reply_rx) = oneshot::channel();
                let (done_tx, mut done_rx) = oneshot::channel();
                let synthetic = Synthetic {
                    slot: RefCell::new(Some((called_tx, reply_rx))),
                };
                actix_web::rt::spawn(run_native(
                    factory,
                    head,
                    Arc::clone(&params),
                    body.clone(),
                    synthetic,
                    done_tx,
                ));

                let finished = tokio::select! {
                    done = &mut done_rx => Some(done),
                    called = &mut called_rx => {
                        if let Ok(head) = called {
                            let mut inner_req = ActixRequest::new(head, params, full_body(body), ctx, options.clone());
                            let mut inner_resp = BufferedResponse::new(Arc::clone(&options.writer));
                            if let Err(err) = next.call(&mut inner_req, &mut inner_resp).await {
                                debug!(error = %err, "handler behind actix middleware failed");
                                options.writer.write(&inner_req, &mut inner_resp, Some(&err));
                            }
                            let _ = reply_tx.send(inner_resp.into_parts());
                        }
                        None
                    }
                };
                let done = match finished {
                    Some(done) => done,
                    None => done_rx.await,
                };

                let (status, headers, bytes) = done
                    .map_err(|_| Error::Bridge("actix middleware task stopped".into()))?
                    .map_err(Error::Bridge)?;
                copy_native(resp, status, &headers, &bytes);
                Ok(())
            })
        })
    })
}

/// Rebuilds a `ServiceRequest` from a snapshot.
fn service_request(head: &Head, params: &PathParams, body: Bytes) -> ServiceRequest {
    let method = actix_web::http::Method::from_bytes(head.method.as_str().as_bytes()).unwrap_or_default();
    let mut req = actix_web::test::TestRequest::default()
        .method(method)
        .uri(&head.uri.to_string());
    for (name, value) in head.headers.iter() {
        if let Ok(value) = actix_web::http::header::HeaderValue::from_bytes(value.as_bytes()) {
            req = req.append_header((name.as_str(), value));
        }
    }
    for (name, value) in params.iter() {
        req = req.param(name.clone(), value.clone());
    }
    req.set_payload(body).to_srv_request()
}

/// Drives the actix middleware around `synthetic` and reports its response.
async fn run_native<F, T, B>(
    factory: Arc<F>,
    head: Head,
    params: PathParams,
    body: Bytes,
    synthetic: Synthetic,
    done: oneshot::Sender<std::result::Result<Parts, String>>,
) where
    F: Fn() -> T,
    T: Transform<Synthetic, ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody + 'static,
{
    let req = service_request(&head, &params, body);
    let outcome = async {
        let service = factory()
            .new_transform(synthetic)
            .await
            .map_err(|_| "actix middleware failed to start".to_string())?;
        let response = match service.call(req).await {
            Ok(out) => out.into_parts().1.map_into_boxed_body(),
            Err(err) => err.error_response(),
        };

        let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let headers = to_http_headers(response.headers());
        let body = actix_web::body::to_bytes(response.into_body())
            .await
            .map_err(|e| e.to_string())?;
        Ok::<Parts, String>((status, headers, body))
    }
    .await;

    let _ = done.send(outcome);
}
