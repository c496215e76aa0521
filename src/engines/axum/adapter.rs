use std::any::Any;
use std::sync::Arc;

use ::axum::body::Body as AxumBody;
use ::axum::extract::{FromRequestParts, RawPathParams, Request as NativeRequest};
use ::axum::response::Response as NativeResponse;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};

use crate::error::Result;
use crate::handler::{BoxFuture, Handler};
use crate::ingest::DataReader;
use crate::transport::form::read_urlencoded;
use crate::transport::{
    boxed_body, cookie_value, limit_body, param, take_head, Body, BufferedResponse, Context, Form, MultipartForm,
    Options, PathParams, Rebound, Request, Values,
};

/// [`Request`] over an axum request.
pub struct AxumRequest {
    native: NativeRequest,
    params: PathParams,
    ctx: Context,
    options: Options,
}

impl AxumRequest {
    pub fn native(&self) -> &NativeRequest {
        &self.native
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    /// Moves the native request out, carrying `ctx` along in its extensions.
    ///
    /// The head stays readable here for middlewares that run after the hand-off.
    pub(crate) fn take_native(&mut self, ctx: Context) -> NativeRequest {
        let mut native = take_head(&mut self.native, AxumBody::empty());
        native.extensions_mut().insert(ctx);
        native
    }
}

impl Request for AxumRequest {
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
        limit_body(boxed_body(std::mem::take(self.native.body_mut())), self.options.body_limit)
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

/// Runs `handler` for one axum request.
///
/// The call context is taken from the request extensions when an enclosing
/// layer already created one, so every layer of a call shares it.
pub(crate) async fn dispatch(handler: &dyn Handler, options: &Options, native: NativeRequest) -> NativeResponse {
    let (mut parts, body) = native.into_parts();

    let params: PathParams = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(raw) => raw.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect(),
        Err(_) => Arc::from(Vec::new()),
    };

    let (ctx, _guard) = match parts.extensions.remove::<Context>() {
        Some(ctx) => (ctx, None),
        None => {
            let ctx = Context::background();
            let guard = ctx.guard();
            (ctx, Some(guard))
        }
    };

    let mut req = AxumRequest {
        native: NativeRequest::from_parts(parts, body),
        params,
        ctx,
        options: options.clone(),
    };
    let mut resp = BufferedResponse::new(Arc::clone(&options.writer));

    if let Err(err) = handler.call(&mut req, &mut resp).await {
        tracing::debug!(error = %err, path = %req.path(), "handler failed");
        options.writer.write(&req, &mut resp, Some(&err));
    }

    into_native(resp)
}

fn into_native(resp: BufferedResponse) -> NativeResponse {
    let (status, headers, body) = resp.into_parts();
    let mut out = NativeResponse::new(AxumBody::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}
