use std::any::Any;
use std::sync::Arc;

use ::poem::{Endpoint, Request as NativeRequest, Response as NativeResponse};
use futures_util::TryStreamExt;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};

use crate::error::{BoxError, Result};
use crate::handler::{BoxFuture, BoxHandler, Handler};
use crate::ingest::DataReader;
use crate::transport::form::read_urlencoded;
use crate::transport::{
    cookie_value, limit_body, param, Body, BufferedResponse, Context, Form, MultipartForm, Options, PathParams,
    Rebound, Request, Values,
};

/// [`Request`] over a poem request.
pub struct PoemRequest {
    native: NativeRequest,
    params: PathParams,
    ctx: Context,
    options: Options,
}

impl PoemRequest {
    pub fn native(&self) -> &NativeRequest {
        &self.native
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    /// Moves the native request out, carrying `ctx` and the route parameters
    /// along in its extensions. The head stays readable here.
    pub(crate) fn take_native(&mut self, ctx: Context) -> NativeRequest {
        let mut head = NativeRequest::builder()
            .method(self.native.method().clone())
            .uri(self.native.uri().clone())
            .version(self.native.version())
            .finish();
        *head.headers_mut() = self.native.headers().clone();

        let mut native = std::mem::replace(&mut self.native, head);
        native.extensions_mut().insert(ctx);
        native.extensions_mut().insert(Arc::clone(&self.params));
        native
    }
}

impl Request for PoemRequest {
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
        self.native.header(key)
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
        let stream = self
            .native
            .take_body()
            .into_bytes_stream()
            .map_ok(Frame::data)
            .map_err(|e| Box::new(e) as BoxError);
        limit_body(StreamBody::new(stream).boxed_unsync(), self.options.body_limit)
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
        cookie_value(self.native.headers(), name)
    }

    fn data_reader(&self) -> &Arc<dyn DataReader> {
        &self.options.reader
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Poem endpoint running a universal handler.
pub struct Entry {
    handler: BoxHandler,
    options: Options,
    param_names: Vec<String>,
}

impl Entry {
    /// Endpoint for the route `pattern`, e.g. `/users/:id`.
    pub(crate) fn new(handler: BoxHandler, options: Options, pattern: &str) -> Self {
        Self {
            handler,
            options,
            param_names: param_names(pattern),
        }
    }
}

impl Endpoint for Entry {
    type Output = NativeResponse;

    async fn call(&self, mut req: NativeRequest) -> ::poem::Result<NativeResponse> {
        let params: PathParams = self
            .param_names
            .iter()
            .filter_map(|name| req.raw_path_param(name).map(|value| (name.clone(), value.to_owned())))
            .collect();
        req.extensions_mut().insert(params);
        Ok(dispatch(&*self.handler, &self.options, req).await)
    }
}

/// Names of the `:name` and `*name` segments of a poem route pattern.
fn param_names(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .filter_map(|segment| segment.strip_prefix(':').or_else(|| segment.strip_prefix('*')))
        .map(|name| name.split('<').next().unwrap_or(name).to_owned())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Runs `handler` for one poem request, reusing the context and route
/// parameters found in the extensions.
pub(crate) async fn dispatch(handler: &dyn Handler, options: &Options, mut native: NativeRequest) -> NativeResponse {
    let params = native
        .extensions_mut()
        .remove::<PathParams>()
        .unwrap_or_else(|| Arc::from(Vec::new()));
    let (ctx, _guard) = match native.extensions_mut().remove::<Context>() {
        Some(ctx) => (ctx, None),
        None => {
            let ctx = Context::background();
            let guard = ctx.guard();
            (ctx, Some(guard))
        }
    };

    let mut req = PoemRequest {
        native,
        params,
        ctx,
        options: options.clone(),
    };
    let mut resp = BufferedResponse::new(Arc::clone(&options.writer));

    if let Err(err) = handler.call(&mut req, &mut resp).await {
        tracing::debug!(error = %err, path = %req.path(), "handler failed");
        options.writer.write(&req, &mut resp, Some(&err));
    }

    let (status, headers, body) = resp.into_parts();
    let mut out = NativeResponse::builder().status(status).body(body);
    *out.headers_mut() = headers;
    out
}
