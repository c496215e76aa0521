//! Adapter for a bare hyper 1 server.
//!
//! # Responsibilities
//! - Route calls with `matchit` (`/users/{id}`), answering 404 and 405 itself
//! - Translate hyper requests into the universal contract and back
//! - Serve connections over HTTP/1.1 until a shutdown future resolves, then
//!   drain in-flight connections
//! - Bridge tower layers into universal middleware
//!
//! # Design Decisions
//! - Global middlewares are applied around every route when the app is built
//! - Dispatch is generic over the body type so tests can drive it without sockets

mod adapter;

pub use adapter::HyperRequest;

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use ::hyper::body::Incoming;
use ::hyper::server::conn::http1;
use ::hyper::service::service_fn;
use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tower::{Layer, Service, ServiceExt};
use tracing::{debug, info, warn};

use super::RouteTable;
use crate::error::{BoxError, Error, Result};
use crate::handler::{handler_fn, middleware_fn, BoxFuture, BoxHandler, Middleware};
use crate::transport::{boxed_body, copy_native, Body, Context, Options, PathParams, Transport};

/// Longest wait for in-flight connections once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Route registry for the hyper adapter.
#[derive(Default)]
pub struct HyperTransport {
    routes: RouteTable,
    middlewares: Vec<Middleware>,
    options: Options,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Builds the routed application.
    pub fn into_app(self) -> Result<HyperApp> {
        let route_count = self.routes.len();
        let mut router = matchit::Router::new();

        for compiled in self.routes.compile(&self.middlewares)? {
            let methods: HashMap<Method, BoxHandler> = compiled.methods.into_iter().collect();
            router
                .insert(compiled.path.clone(), methods)
                .map_err(|e| Error::Route {
                    path: compiled.path,
                    reason: e.to_string(),
                })?;
        }

        info!(routes = route_count, "hyper app built");
        Ok(HyperApp {
            router,
            options: self.options,
        })
    }

    /// Serves `listener` until `shutdown` resolves, then drains open connections.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let app = Arc::new(self.into_app()?);
        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        if let Ok(addr) = listener.local_addr() {
            info!(address = %addr, "hyper transport listening");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let service = service_fn(move |req: http::Request<Incoming>| {
                        let app = Arc::clone(&app);
                        async move { Ok::<_, Infallible>(app.dispatch(req).await) }
                    });
                    let conn = graceful.watch(http1::Builder::new().serve_connection(TokioIo::new(stream), service));

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            debug!(peer = %peer, error = %e, "connection ended with error");
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("hyper transport shutting down");
                    break;
                }
            }
        }

        drop(listener);
        tokio::select! {
            _ = graceful.shutdown() => debug!("all connections drained"),
            _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
                warn!(timeout_secs = DRAIN_TIMEOUT.as_secs(), "connections still open after drain timeout");
            }
        }
        Ok(())
    }
}

impl Transport for HyperTransport {
    fn add_route(&mut self, method: Method, path: &str, handler: BoxHandler, middlewares: Vec<Middleware>) {
        self.routes.push(method, path, handler, middlewares);
    }

    fn use_middleware(&mut self, middlewares: Vec<Middleware>) {
        self.middlewares.extend(middlewares);
    }
}

/// Routed hyper application.
pub struct HyperApp {
    router: matchit::Router<HashMap<Method, BoxHandler>>,
    options: Options,
}

impl HyperApp {
    /// Handles one request.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let req = req.map(boxed_body);

        let (handler, params) = match self.router.at(req.uri().path()) {
            Ok(matched) => match matched.value.get(req.method()) {
                Some(handler) => {
                    let params: PathParams = matched
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect();
                    (Arc::clone(handler), params)
                }
                None => return bare(StatusCode::METHOD_NOT_ALLOWED),
            },
            Err(_) => return bare(StatusCode::NOT_FOUND),
        };

        let ctx = Context::background();
        let _guard = ctx.guard();
        adapter::run(&*handler, &self.options, req, params, ctx)
            .await
            .into_http()
    }
}

fn bare(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Service handed to bridged tower layers; calls back into the universal chain.
#[derive(Clone)]
pub struct Bridge {
    next: BoxHandler,
    options: Options,
    params: PathParams,
    ctx: Context,
}

impl Service<http::Request<Body>> for Bridge {
    type Response = http::Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        let bridge = self.clone();
        Box::pin(async move {
            let resp = adapter::run(&*bridge.next, &bridge.options, req, bridge.params, bridge.ctx).await;
            Ok(resp.into_http())
        })
    }
}

/// Runs a tower layer as universal middleware on the hyper adapter.
pub fn from_layer<L, B>(layer: L) -> Middleware
where
    L: Layer<Bridge> + Send + Sync + 'static,
    L::Service: Service<http::Request<Body>, Response = http::Response<B>> + Send + 'static,
    <L::Service as Service<http::Request<Body>>>::Future: Send,
    <L::Service as Service<http::Request<Body>>>::Error: Into<BoxError>,
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
                let hyper_req = req
                    .as_any_mut()
                    .downcast_mut::<HyperRequest>()
                    .ok_or_else(|| Error::Bridge("tower layer bridged onto a non-hyper request".into()))?;
                let options = hyper_req.options().clone();
                let native = hyper_req.take_native();
                let params = hyper_req.params();

                let bridge = Bridge {
                    next,
                    options,
                    params,
                    ctx,
                };
                let call: BoxFuture<'static, _> = Box::pin(layer.layer(bridge).oneshot(native));
                let out = call
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

#[cfg(test)]
mod tests {
    use http::header::ACCEPT;
    use http::HeaderValue;

    use super::*;
    use crate::reply::Data;

    fn echo_id() -> BoxHandler {
        handler_fn(|req, resp| {
            Box::pin(async move {
                let id = req.path_value("id").unwrap_or_default().to_owned();
                resp.write_data(req, &Data(serde_json::json!({ "id": id })));
                Ok(())
            })
        })
    }

    fn get(uri: &str) -> http::Request<Full<Bytes>> {
        http::Request::builder()
            .uri(uri)
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body_of(resp: http::Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_dispatch_routes_with_params() {
        let mut transport = HyperTransport::new();
        transport.add_route(Method::GET, "/users/{id}", echo_id(), vec![]);
        let app = transport.into_app().unwrap();

        let resp = app.dispatch(get("/users/42")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_of(resp).await, Bytes::from_static(br#"{"id":"42"}"#));
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let mut transport = HyperTransport::new();
        transport.add_route(Method::POST, "/users/{id}", echo_id(), vec![]);
        let app = transport.into_app().unwrap();

        assert_eq!(app.dispatch(get("/nothing")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.dispatch(get("/users/1")).await.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_handler_error_goes_through_pipeline() {
        let mut transport = HyperTransport::new();
        transport.add_route(
            Method::GET,
            "/fail",
            handler_fn(|_req, _resp| Box::pin(async { Err(Error::status(StatusCode::IM_A_TEAPOT, "short and stout")) })),
            vec![],
        );
        let app = transport.into_app().unwrap();

        let resp = app.dispatch(get("/fail")).await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_of(resp).await, Bytes::from_static(br#"{"error":"short and stout"}"#));
    }

    #[tokio::test]
    async fn test_tower_layer_bridge() {
        use tower_http::set_header::SetResponseHeaderLayer;

        let mut transport = HyperTransport::new();
        transport.use_middleware(vec![from_layer(SetResponseHeaderLayer::overriding(
            http::HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("mosaic"),
        ))]);
        transport.add_route(Method::GET, "/users/{id}", echo_id(), vec![]);
        let app = transport.into_app().unwrap();

        let resp = app.dispatch(get("/users/9")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-powered-by"], "mosaic");
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(body_of(resp).await, Bytes::from_static(br#"{"id":"9"}"#));
    }

    #[tokio::test]
    async fn test_request_head_survives_tower_bridge() {
        use std::sync::Mutex;
        use tower_http::set_header::SetResponseHeaderLayer;

        let seen: Arc<Mutex<Option<(String, Option<String>)>>> = Arc::default();
        let observe = {
            let seen = Arc::clone(&seen);
            middleware_fn(move |next| {
                let seen = Arc::clone(&seen);
                handler_fn(move |req, resp| {
                    let next = Arc::clone(&next);
                    let seen = Arc::clone(&seen);
                    Box::pin(async move {
                        let result = next.call(req, resp).await;
                        let accept = req.header("accept").map(str::to_owned);
                        *seen.lock().unwrap() = Some((req.path().to_owned(), accept));
                        result
                    })
                })
            })
        };

        let mut transport = HyperTransport::new();
        transport.add_route(
            Method::GET,
            "/users/{id}",
            echo_id(),
            vec![
                observe,
                from_layer(SetResponseHeaderLayer::overriding(
                    http::HeaderName::from_static("x-powered-by"),
                    HeaderValue::from_static("mosaic"),
                )),
            ],
        );
        let app = transport.into_app().unwrap();

        let resp = app.dispatch(get("/users/4")).await;
        assert_eq!(resp.headers()["x-powered-by"], "mosaic");
        assert_eq!(
            *seen.lock().unwrap(),
            Some(("/users/4".to_string(), Some("application/json".to_string())))
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let echo = handler_fn(|req, resp| {
            Box::pin(async move {
                let value: serde_json::Value = req.read_data().await?;
                resp.write_data(req, &Data(value));
                Ok(())
            })
        });
        let mut transport = HyperTransport::with_options(Options::default().with_body_limit(8));
        transport.add_route(Method::POST, "/echo", echo, vec![]);
        let app = transport.into_app().unwrap();

        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header(ACCEPT, "text/plain")
            .body(Full::new(Bytes::from_static(br#"{"name":"too long"}"#)))
            .unwrap();
        let resp = app.dispatch(req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_of(resp).await, Bytes::from_static(b"request body exceeds 8 bytes"));
    }
}
