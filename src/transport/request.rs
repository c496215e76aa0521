//! Engine-neutral request contract.

use std::any::Any;
use std::sync::Arc;

use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;

use super::{Body, Context, Form, Values};
use crate::error::Result;
use crate::handler::BoxFuture;
use crate::ingest::DataReader;

/// Read side of a call, implemented once per engine.
///
/// The body can be taken once; later calls to [`Request::body`] see an empty body.
pub trait Request: Send {
    fn context(&self) -> &Context;

    /// Same call observed through `ctx`.
    ///
    /// Engines that cannot carry a context keep the original one.
    fn with_context(&mut self, ctx: Context) -> Box<dyn Request + '_>;

    fn method(&self) -> &Method;

    fn path(&self) -> &str;

    /// First value of header `key`, if it is valid text.
    fn header(&self, key: &str) -> Option<&str>;

    fn headers(&self) -> &HeaderMap;

    fn queries(&self) -> Values;

    /// Value of the route parameter `name`.
    fn path_value(&self, name: &str) -> Option<&str>;

    fn body(&mut self) -> Body;

    fn multipart_form(&mut self, max_memory: u64) -> BoxFuture<'_, Result<Box<dyn Form>>>;

    fn urlencoded_form(&mut self) -> BoxFuture<'_, Result<Values>>;

    fn cookie(&self, name: &str) -> Option<String>;

    /// Ingestion strategy used by [`read_data`](#method.read_data).
    fn data_reader(&self) -> &Arc<dyn DataReader>;

    /// Native request access for adapters bridging foreign middleware.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Request + '_ {
    /// Decodes the body into `T` through the configured [`DataReader`].
    pub async fn read_data<T: DeserializeOwned>(&mut self) -> Result<T> {
        let reader = Arc::clone(self.data_reader());
        reader.read(self).await?.decode()
    }
}

/// Request seen through a replacement context; everything else is forwarded.
pub(crate) struct Rebound<'a> {
    inner: &'a mut dyn Request,
    ctx: Context,
}

impl<'a> Rebound<'a> {
    pub(crate) fn new(inner: &'a mut dyn Request, ctx: Context) -> Self {
        Self { inner, ctx }
    }
}

impl Request for Rebound<'_> {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn with_context(&mut self, ctx: Context) -> Box<dyn Request + '_> {
        Box::new(Rebound::new(self, ctx))
    }

    fn method(&self) -> &Method {
        self.inner.method()
    }

    fn path(&self) -> &str {
        self.inner.path()
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.inner.header(key)
    }

    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn queries(&self) -> Values {
        self.inner.queries()
    }

    fn path_value(&self, name: &str) -> Option<&str> {
        self.inner.path_value(name)
    }

    fn body(&mut self) -> Body {
        self.inner.body()
    }

    fn multipart_form(&mut self, max_memory: u64) -> BoxFuture<'_, Result<Box<dyn Form>>> {
        self.inner.multipart_form(max_memory)
    }

    fn urlencoded_form(&mut self) -> BoxFuture<'_, Result<Values>> {
        self.inner.urlencoded_form()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.inner.cookie(name)
    }

    fn data_reader(&self) -> &Arc<dyn DataReader> {
        self.inner.data_reader()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self.inner.as_any_mut()
    }
}

/// Moves `native` out, leaving a bodiless copy of its head in its place.
///
/// Middlewares outside a native hand-off keep seeing the same method, URI
/// and headers; only the body is gone.
pub(crate) fn take_head<B>(native: &mut http::Request<B>, empty: B) -> http::Request<B> {
    let mut head = http::Request::new(empty);
    *head.method_mut() = native.method().clone();
    *head.uri_mut() = native.uri().clone();
    *head.version_mut() = native.version();
    *head.headers_mut() = native.headers().clone();
    std::mem::replace(native, head)
}

/// Looks up a captured route parameter.
pub(crate) fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
