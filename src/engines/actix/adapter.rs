use std::any::Any;
use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use tracing::debug;

use crate::error::{Error, Result};
use crate::handler::{BoxFuture, Handler};
use crate::ingest::DataReader;
use crate::transport::form::read_urlencoded;
use crate::transport::{
    cookie_value, empty_body, failed_body, full_body, param, Body, BufferedResponse, Context, Form, MultipartForm,
    Options, PathParams, Rebound, Request, Values,
};

/// Method, URI and headers of an actix request, in http 1 types.
#[derive(Debug, Clone)]
pub(crate) struct Head {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
}

impl Head {
    pub(crate) fn of(native: &HttpRequest) -> Self {
        let method = Method::from_bytes(native.method().as_str().as_bytes()).unwrap_or_default();
        let uri = native.uri().to_string().parse::<Uri>().unwrap_or_default();
        Self {
            method,
            uri,
            headers: to_http_headers(native.headers()),
        }
    }
}

pub(crate) fn to_http_headers(native: &actix_web::http::header::HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(native.len());
    for (name, value) in native.iter() {
        match (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!(header = %name, "skipping header not representable in http 1"),
        }
    }
    headers
}

/// [`Request`] over a snapshot of an actix-web request.
///
/// `HttpRequest` is bound to its worker thread, so the adapter copies what a
/// handler can observe and buffers the body up front.
pub struct ActixRequest {
    head: Head,
    params: PathParams,
    body: Option<Body>,
    ctx: Context,
    options: Options,
}

impl ActixRequest {
    pub(crate) fn new(head: Head, params: PathParams, body: Body, ctx: Context, options: Options) -> Self {
        Self {
            head,
            params,
            body: Some(body),
            ctx,
            options,
        }
    }

    /// Snapshot of `native`; a body the extractor refused fails when read.
    pub(crate) fn snapshot(native: &HttpRequest, body: Result<Bytes>, ctx: Context, options: Options) -> Self {
        let params: PathParams = native
            .match_info()
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let body = match body {
            Ok(bytes) => full_body(bytes),
            Err(err) => failed_body(err),
        };
        Self::new(Head::of(native), params, body, ctx, options)
    }

    pub(crate) fn head(&self) -> &Head {
        &self.head
    }

    pub(crate) fn params(&self) -> PathParams {
        Arc::clone(&self.params)
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }
}

impl Request for ActixRequest {
    fn context(&self) -> &Context {
        &self.ctx
    }

    /// actix-web has no per-request context slot; the original context is kept.
    fn with_context(&mut self, _ctx: Context) -> Box<dyn Request + '_> {
        debug!("actix adapter cannot rebind the call context");
        let ctx = self.ctx.clone();
        Box::new(Rebound::new(self, ctx))
    }

    fn method(&self) -> &Method {
        &self.head.method
    }

    fn path(&self) -> &str {
        self.head.uri.path()
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.head.headers.get(key).and_then(|v| v.to_str().ok())
    }

    fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    fn queries(&self) -> Values {
        Values::parse(self.head.uri.query().unwrap_or_default())
    }

    fn path_value(&self, name: &str) -> Option<&str> {
        param(&self.params, name)
    }

    fn body(&mut self) -> Body {
        self.body.take().unwrap_or_else(empty_body)
    }

    fn multipart_form(&mut self, max_memory: u64) -> BoxFuture<'_, Result<Box<dyn Form>>> {
        let content_type = self.header(CONTENT_TYPE.as_str()).map(str::to_owned);
        let body = self.body();
        Box::pin(async move {
            let form = MultipartForm::parse(content_type.as_deref(), body, max_memory).await?;
            Ok(Box::new(form) as Box<dyn Form>)
        })
    }

    fn urlencoded_form(&mut self) -> BoxFuture<'_, Result<Values>> {
        read_urlencoded(self)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        cookie_value(&self.head.headers, name)
    }

    fn data_reader(&self) -> &Arc<dyn DataReader> {
        &self.options.reader
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Maps an actix payload extraction failure onto the crate error.
pub(crate) fn payload_error(err: &actix_web::Error, limit: usize) -> Error {
    if err.as_response_error().status_code() == actix_web::http::StatusCode::PAYLOAD_TOO_LARGE {
        Error::TooLarge { limit }
    } else {
        Error::Body(err.to_string().into())
    }
}

/// Runs `handler` on a request snapshot and converts the result for actix-web.
pub(crate) async fn dispatch(handler: &dyn Handler, options: &Options, mut req: ActixRequest) -> HttpResponse {
    let _guard = req.ctx.guard();
    let mut resp = BufferedResponse::new(Arc::clone(&options.writer));

    if let Err(err) = handler.call(&mut req, &mut resp).await {
        debug!(error = %err, path = %req.path(), "handler failed");
        options.writer.write(&req, &mut resp, Some(&err));
    }

    let (status, headers, body) = resp.into_parts();
    to_native(status, &headers, body)
}

pub(crate) fn to_native(status: StatusCode, headers: &HeaderMap, body: Bytes) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(status.as_u16())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = HttpResponse::build(status);
    for (name, value) in headers.iter() {
        match actix_web::http::header::HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => {
                builder.append_header((name.as_str(), value));
            }
            Err(_) => debug!(header = %name, "dropping header not representable in actix-web"),
        }
    }
    builder.body(body)
}
