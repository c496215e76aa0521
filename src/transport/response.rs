//! Engine-neutral response contract and the buffered response every adapter uses.
//!
//! # Design Decisions
//! - Status and headers are mutable until the response is committed by
//!   `write_header` or the first body write; later changes are ignored
//! - Adapters convert the buffer into their native response after the handler returns

use std::any::Any;
use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use tracing::debug;

use super::{Cookie, Request};
use crate::pipeline::WriteResponse;
use crate::reply::Reply;

/// Write side of a call.
pub trait Response: Send {
    /// Status used when the response is committed.
    fn set_status(&mut self, status: StatusCode);

    /// Replaces every value of `name`.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Appends a value to `name`.
    fn add_header(&mut self, name: HeaderName, value: HeaderValue);

    fn set_cookie(&mut self, cookie: &Cookie);

    /// Commits `status` and the current headers.
    fn write_header(&mut self, status: StatusCode);

    /// Appends body bytes, committing the response first if needed.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Commits `status` and writes `body`.
    fn set_body(&mut self, body: &[u8], status: StatusCode) -> usize {
        self.write_header(status);
        self.write(body)
    }

    /// Result-writing strategy used by [`write_data`](#method.write_data).
    fn writer(&self) -> &Arc<dyn WriteResponse>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Response + '_ {
    /// Writes a handler result through the configured [`WriteResponse`] strategy.
    pub fn write_data(&mut self, req: &dyn Request, data: &dyn Reply) {
        let writer = Arc::clone(self.writer());
        writer.write(req, self, Some(data));
    }

    /// Writes an absent result (204).
    pub fn write_empty(&mut self, req: &dyn Request) {
        let writer = Arc::clone(self.writer());
        writer.write(req, self, None);
    }
}

/// `io::Write` view of a response, used by streaming components.
pub struct ResponseWriter<'a> {
    inner: &'a mut dyn Response,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(inner: &'a mut dyn Response) -> Self {
        Self { inner }
    }
}

impl io::Write for ResponseWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.inner.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory response with commit semantics.
pub struct BufferedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
    writer: Arc<dyn WriteResponse>,
}

impl BufferedResponse {
    pub fn new(writer: Arc<dyn WriteResponse>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            committed: false,
            writer,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body.freeze())
    }

    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let (status, headers, body) = self.into_parts();
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        if self.committed {
            debug!("header change after the response was committed is ignored");
            return None;
        }
        Some(&mut self.headers)
    }
}

impl Response for BufferedResponse {
    fn set_status(&mut self, status: StatusCode) {
        if self.committed {
            debug!(status = status.as_u16(), "status change after the response was committed is ignored");
            return;
        }
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if let Some(headers) = self.headers_mut() {
            headers.insert(name, value);
        }
    }

    fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        if let Some(headers) = self.headers_mut() {
            headers.append(name, value);
        }
    }

    fn set_cookie(&mut self, cookie: &Cookie) {
        match cookie.to_header_value() {
            Some(value) => self.add_header(SET_COOKIE, value),
            None => debug!(name = %cookie.name, "cookie dropped, not representable as a header"),
        }
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            debug!(status = status.as_u16(), "superfluous write_header call");
            return;
        }
        self.status = status;
        self.committed = true;
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        self.committed = true;
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    fn writer(&self) -> &Arc<dyn WriteResponse> {
        &self.writer
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Copies headers setting the first value of each name and appending the rest.
pub(crate) fn copy_headers(resp: &mut dyn Response, headers: &HeaderMap) {
    for name in headers.keys() {
        let mut values = headers.get_all(name).iter();
        if let Some(first) = values.next() {
            resp.set_header(name.clone(), first.clone());
        }
        for value in values {
            resp.add_header(name.clone(), value.clone());
        }
    }
}

/// Replays a native response produced by a bridged middleware.
///
/// Native headers are appended, so values set by outer middlewares survive.
pub(crate) fn copy_native(resp: &mut dyn Response, status: StatusCode, headers: &HeaderMap, body: &[u8]) {
    for (name, value) in headers {
        resp.add_header(name.clone(), value.clone());
    }
    resp.set_body(body, status);
}
