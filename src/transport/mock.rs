use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use super::form::{read_urlencoded, MultipartForm};
use super::{cookie, empty_body, full_body, Body, Context, Form, Rebound, Request, Values};
use crate::error::Result;
use crate::handler::BoxFuture;
use crate::ingest::{DataReader, JsonReader};

/// Engine-less request used by unit tests.
pub(crate) struct MockRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    params: Vec<(String, String)>,
    ctx: Context,
    reader: Arc<dyn DataReader>,
}

impl MockRequest {
    pub(crate) fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (uri.to_owned(), None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: None,
            params: Vec::new(),
            ctx: Context::background(),
            reader: Arc::new(JsonReader),
        }
    }

    pub(crate) fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    pub(crate) fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_owned(), value.to_owned()));
        self
    }
}

impl Request for MockRequest {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn with_context(&mut self, ctx: Context) -> Box<dyn Request + '_> {
        Box::new(Rebound::new(self, ctx))
    }

    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn queries(&self) -> Values {
        Values::parse(self.query.as_deref().unwrap_or_default())
    }

    fn path_value(&self, name: &str) -> Option<&str> {
        super::param(&self.params, name)
    }

    fn body(&mut self) -> Body {
        match self.body.take() {
            Some(bytes) => full_body(bytes),
            None => empty_body(),
        }
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
        cookie::lookup(&self.headers, name)
    }

    fn data_reader(&self) -> &Arc<dyn DataReader> {
        &self.reader
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
