//! Shared routes and engine runners for the integration tests.
//!
//! Every test registers the same routes through `register`, sends one
//! synthetic request to an engine and compares the normalized [`Outcome`].

#![allow(dead_code)]

use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use http::{HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use mosaic_transport::config::Engine;
use mosaic_transport::engines::actix::ActixTransport;
use mosaic_transport::engines::axum::AxumTransport;
use mosaic_transport::engines::hyper::HyperTransport;
use mosaic_transport::engines::poem::PoemTransport;
use mosaic_transport::handler::{handler_fn, middleware_fn, BoxHandler, Middleware};
use mosaic_transport::middleware::timeout;
use mosaic_transport::transport::{Cookie, Transport};
use mosaic_transport::{Data, Error, Html, NoContent, Options, WithStatus};
use serde::{Deserialize, Serialize};

pub const X_TRACE: HeaderName = HeaderName::from_static("x-trace");

pub const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

pub const BOUNDARY: &str = "mosaic-boundary";

/// Request body limit every runner configures.
pub const BODY_LIMIT: usize = 1024;

/// Transport-wide call deadline; only `/slow` runs into it.
pub const DEADLINE: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

/// Appends `name` to the `x-trace` response header, then calls through.
pub fn tag(name: &'static str) -> Middleware {
    middleware_fn(move |next| {
        handler_fn(move |req, resp| {
            let next = next.clone();
            Box::pin(async move {
                resp.add_header(X_TRACE, HeaderValue::from_static(name));
                next.call(req, resp).await
            })
        })
    })
}

/// Answers 403 without calling the wrapped handler.
pub fn deny() -> Middleware {
    middleware_fn(|_next| {
        handler_fn(|req, resp| {
            Box::pin(async move {
                let body = Data(serde_json::json!({ "error": "forbidden" }));
                resp.write_data(req, &WithStatus::new(StatusCode::FORBIDDEN, body));
                Ok(())
            })
        })
    })
}

fn get_user() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            let id: u64 = req
                .path_value("id")
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| Error::status(StatusCode::BAD_REQUEST, "invalid user id"))?;
            resp.write_data(
                req,
                &Data(User {
                    id,
                    name: format!("user-{id}"),
                }),
            );
            Ok(())
        })
    })
}

fn create_user() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            let new_user: NewUser = req.read_data().await?;
            let user = User {
                id: 1,
                name: new_user.name,
            };
            resp.write_data(req, &WithStatus::new(StatusCode::CREATED, Data(user)));
            Ok(())
        })
    })
}

fn delete_user() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            resp.write_data(req, &NoContent);
            Ok(())
        })
    })
}

fn conflict() -> BoxHandler {
    handler_fn(|_req, _resp| Box::pin(async { Err(Error::status(StatusCode::CONFLICT, "user already exists")) }))
}

fn login() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            let form = req.urlencoded_form().await?;
            let summary = serde_json::json!({
                "user": form.get("user"),
                "next": form.get("next"),
            });
            resp.write_data(req, &Data(summary));
            Ok(())
        })
    })
}

fn whoami() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            let session = req.cookie("session");
            let mut seen = Cookie::new("seen", "1");
            seen.path = Some("/".into());
            resp.set_cookie(&seen);
            resp.write_data(req, &Data(serde_json::json!({ "session": session })));
            Ok(())
        })
    })
}

fn upload() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            let form = req.multipart_form(1 << 20).await?;
            let (_, header) = form.file("avatar")?;
            let summary = serde_json::json!({
                "owner": form.value("owner"),
                "filename": header.filename,
                "size": header.size,
            });
            resp.write_data(req, &Data(summary));
            Ok(())
        })
    })
}

#[derive(askama::Template)]
#[template(source = "<h1>Welcome, {{ name }}</h1>", ext = "html")]
struct Welcome<'a> {
    name: &'a str,
}

fn welcome() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            resp.write_data(req, &Html(Welcome { name: "ada & co" }));
            Ok(())
        })
    })
}

fn slow() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            resp.write_data(req, &Data("done"));
            Ok(())
        })
    })
}

/// `engine`'s own middleware setting `x-powered-by: mosaic`, bridged in.
pub fn powered_by(engine: Engine) -> Middleware {
    match engine {
        Engine::Hyper => mosaic_transport::engines::hyper::from_layer(
            tower_http::set_header::SetResponseHeaderLayer::overriding(X_POWERED_BY, HeaderValue::from_static("mosaic")),
        ),
        Engine::Axum => mosaic_transport::engines::axum::from_layer(
            tower_http::set_header::SetResponseHeaderLayer::overriding(X_POWERED_BY, HeaderValue::from_static("mosaic")),
        ),
        Engine::Poem => mosaic_transport::engines::poem::from_middleware(
            poem::middleware::SetHeader::new().overriding("x-powered-by", "mosaic"),
        ),
        Engine::Actix => mosaic_transport::engines::actix::from_transform(|| {
            actix_web::middleware::DefaultHeaders::new().add(("x-powered-by", "mosaic"))
        }),
    }
}

/// Registers the shared routes using `engine`'s path syntax.
pub fn register(transport: &mut dyn Transport, engine: Engine) {
    let user_path = format!("/users/{}", engine.path_param("id"));
    let bridged_path = format!("/bridged/{}", engine.path_param("id"));

    transport.use_middleware(vec![tag("global"), timeout(DEADLINE)]);
    transport.add_route(Method::GET, &user_path, get_user(), vec![tag("route")]);
    transport.add_route(Method::DELETE, &user_path, delete_user(), vec![]);
    transport.add_route(Method::POST, "/users", create_user(), vec![]);
    transport.add_route(Method::GET, "/conflict", conflict(), vec![]);
    transport.add_route(Method::GET, "/admin", get_user(), vec![deny()]);
    transport.add_route(Method::POST, "/login", login(), vec![]);
    transport.add_route(Method::GET, "/whoami", whoami(), vec![]);
    transport.add_route(Method::POST, "/upload", upload(), vec![]);
    transport.add_route(Method::GET, "/welcome", welcome(), vec![]);
    transport.add_route(Method::GET, "/slow", slow(), vec![]);
    transport.add_route(Method::GET, &bridged_path, get_user(), vec![powered_by(engine), tag("route")]);
    transport.add_route(Method::POST, "/bridged", create_user(), vec![powered_by(engine)]);
}

fn options() -> Options {
    Options::default().with_body_limit(BODY_LIMIT)
}

/// Synthetic request shared by every engine runner.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub uri: String,
    pub headers: Vec<(HeaderName, String)>,
    pub body: Bytes,
}

impl Call {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn accept(self, value: &str) -> Self {
        self.header(ACCEPT, value)
    }

    pub fn cookie(self, value: &str) -> Self {
        self.header(COOKIE, value)
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn json(self, body: &'static str) -> Self {
        self.header(CONTENT_TYPE, "application/json").body(body)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn to_http<B>(&self, body: impl FnOnce(Bytes) -> B) -> http::Request<B> {
        let mut builder = http::Request::builder().method(self.method.clone()).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder.body(body(self.body.clone())).unwrap()
    }
}

/// Engine-independent view of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: u16,
    pub content_type: Option<String>,
    pub trace: Vec<String>,
    pub powered_by: Vec<String>,
    pub set_cookie: Vec<String>,
    pub body: Bytes,
}

impl Outcome {
    fn new<'a>(
        status: u16,
        header: impl Fn(&str) -> Vec<&'a [u8]>,
        body: Bytes,
    ) -> Self {
        let text = |name: &str| -> Vec<String> {
            header(name)
                .into_iter()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .collect()
        };
        // Engines disagree on whether a 204 keeps its Content-Type.
        let content_type = match status {
            204 => None,
            _ => text("content-type").into_iter().next(),
        };
        Self {
            status,
            content_type,
            trace: text("x-trace"),
            powered_by: text("x-powered-by"),
            set_cookie: text("set-cookie"),
            body,
        }
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

pub async fn run_hyper(call: &Call) -> Outcome {
    let mut transport = HyperTransport::with_options(options());
    register(&mut transport, Engine::Hyper);
    let app = transport.into_app().unwrap();

    let resp = app.dispatch(call.to_http(Full::new)).await;
    let (parts, body) = resp.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    Outcome::new(
        parts.status.as_u16(),
        |name| parts.headers.get_all(name).iter().map(|v| v.as_bytes()).collect(),
        body,
    )
}

pub async fn run_axum(call: &Call) -> Outcome {
    use tower::ServiceExt;

    let mut transport = AxumTransport::default().with_options(options());
    register(&mut transport, Engine::Axum);
    let router = transport.into_router().unwrap();

    let resp = router.oneshot(call.to_http(axum::body::Body::from)).await.unwrap();
    let (parts, body) = resp.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    Outcome::new(
        parts.status.as_u16(),
        |name| parts.headers.get_all(name).iter().map(|v| v.as_bytes()).collect(),
        body,
    )
}

pub async fn run_poem(call: &Call) -> Outcome {
    use poem::Endpoint;

    let mut transport = PoemTransport::with_options(options());
    register(&mut transport, Engine::Poem);
    let route = transport.into_route().unwrap();

    let (parts, body) = call.to_http(poem::Body::from).into_parts();
    let parts: poem::RequestParts = (
        parts,
        poem::web::LocalAddr::default(),
        poem::web::RemoteAddr::default(),
        poem::http::uri::Scheme::HTTP,
    )
        .into();
    let req = poem::Request::from_parts(parts, body);
    let resp = route.get_response(req).await;
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = resp.into_body().into_bytes().await.unwrap();
    Outcome::new(
        status,
        |name| headers.get_all(name).iter().map(|v| v.as_bytes()).collect(),
        body,
    )
}

/// Must run on an actix system (`#[actix_web::test]`).
pub async fn run_actix(call: &Call) -> Outcome {
    use actix_web::{test, App};

    let mut transport = ActixTransport::new().with_options(options());
    register(&mut transport, Engine::Actix);
    let app = test::init_service(App::new().configure(transport.into_configurator().unwrap())).await;

    let method = actix_web::http::Method::from_bytes(call.method.as_str().as_bytes()).unwrap();
    let mut req = test::TestRequest::default().method(method).uri(&call.uri);
    for (name, value) in &call.headers {
        req = req.insert_header((name.as_str(), value.as_str()));
    }
    let resp = test::call_service(&app, req.set_payload(call.body.clone()).to_request()).await;

    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = test::read_body(resp).await;
    Outcome::new(
        status,
        |name| headers.get_all(name).map(|v| v.as_bytes()).collect(),
        body,
    )
}

/// Runs `call` on every engine; panics unless all outcomes match.
pub async fn run_everywhere(call: &Call) -> Outcome {
    let hyper = run_hyper(call).await;
    let axum = run_axum(call).await;
    let poem = run_poem(call).await;
    let actix = run_actix(call).await;

    assert_eq!(axum, hyper, "axum differs from hyper for {call:?}");
    assert_eq!(poem, hyper, "poem differs from hyper for {call:?}");
    assert_eq!(actix, hyper, "actix differs from hyper for {call:?}");
    hyper
}

/// Multipart body with an `owner` field and an `avatar` file.
pub fn multipart_body() -> Bytes {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"owner\"\r\n\r\n\
         ada\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"avatar\"; filename=\"ada.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNGDATA\r\n\
         --{BOUNDARY}--\r\n"
    );
    Bytes::from(body)
}
