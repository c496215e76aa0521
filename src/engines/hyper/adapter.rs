use std::any::Any;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};

use crate::error::Result;
use crate::handler::{BoxFuture, Handler};
use crate::ingest::DataReader;
use crate::transport::form::read_urlencoded;
use crate::transport::{
    empty_body, limit_body, param, take_head, Body, BufferedResponse, Context, Form, MultipartForm, Options,
    PathParams, Rebound, Request, Values,
};

/// [`Request`] over a hyper request.
pub struct HyperRequest {
    native: http::Request<Body>,
    params: PathParams,
    ctx: Context,
    options: Options,
}

impl HyperRequest {
    pub(crate) fn new(native: http::Request<Body>, params: PathParams, ctx: Context, options: Options) -> Self {
        Self {
            native,
            params,
            ctx,
            options,
        }
    }

    pub fn native(&self) -> &http::Request<Body> {
        &self.native
    }

    pub(crate) fn params(&self) -> PathParams {
        Arc::clone(&self.params)
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    /// Moves the native request out; its head stays readable here.
    pub(crate) fn take_native(&mut self) -> http::Request<Body> {
        take_head(&mut self.native, empty_body())
    }
}

impl Request for HyperRequest {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn with_context(&mut self, ctx: Context) -> Box<dyn Request + '_> {
        Box::new(Rebound::new(self, ctx))
    }

    fn method(&self) -> &Method {
        self.native.method()
    }

    fn path(&self) -> &str {
        self.native.uri().path()
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.native.headers().get(key).and_then(|v| v.to_str().ok())
    }

    fn headers(&self) -> &HeaderMap {
        self.native.headers()
    }

    fn queries(&self) -> Values {
        Values::parse(self.native.uri().query().unwrap_or_default())
    }

    fn path_value(&self, name: &str) -> Option<&str> {
        param(&self.params, name)
    }

    fn body(&mut self) -> Body {
        limit_body(std::mem::replace(self.native.body_mut(), empty_body()), self.options.body_limit)
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
        crate::transport::cookie_value(self.native.headers(), name)
    }

    fn data_reader(&self) -> &Arc<dyn DataReader> {
        &self.options.reader
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Runs `handler` for one native request and returns the buffered result.
///
/// A handler error is written through the result pipeline.
pub(crate) async fn run(
    handler: &dyn Handler,
    options: &Options,
    native: http::Request<Body>,
    params: PathParams,
    ctx: Context,
) -> BufferedResponse {
    let mut req = HyperRequest::new(native, params, ctx, options.clone());
    let mut resp = BufferedResponse::new(Arc::clone(&options.writer));

    if let Err(err) = handler.call(&mut req, &mut resp).await {
        tracing::debug!(error = %err, path = %req.path(), "handler failed");
        options.writer.write(&req, &mut resp, Some(&err));
    }
    resp
}
