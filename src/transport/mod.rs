//! Universal transport contracts.
//!
//! # Responsibilities
//! - Define the request/response capabilities every engine adapter provides
//! - Define the route registration surface shared by all adapters
//! - Carry the pluggable ingestion and result-writing strategies
//!
//! # Design Decisions
//! - Contracts are object-safe traits so one handler value runs on any engine
//! - Bodies are boxed `http-body` streams regardless of the engine's own body type
//! - Every adapter enforces the same body limit; an oversized body fails with
//!   [`Error::TooLarge`] when it is read, so the pipeline renders the 413

mod context;
mod cookie;
pub(crate) mod form;
mod request;
mod response;
mod values;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use http_body_util::combinators::UnsyncBoxBody;
use http_body::Frame;
use http_body_util::{BodyExt, Empty, Full, LengthLimitError, Limited, StreamBody};

use crate::error::{BoxError, Error};
use crate::handler::{BoxHandler, Middleware};
use crate::ingest::{DataReader, JsonReader};
use crate::pipeline::{Negotiate, WriteResponse};

pub use context::Context;
pub(crate) use self::cookie::lookup as cookie_value;
pub use self::cookie::{Cookie, SameSite};
pub use form::{FileHeader, FileReader, Form, MultipartForm};
pub(crate) use request::{param, take_head, Rebound};
pub use request::Request;
pub(crate) use response::{copy_headers, copy_native};
pub use response::{BufferedResponse, Response, ResponseWriter};
pub use values::Values;

/// Largest request body read by default, in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Request body as seen by handlers.
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// Route parameters captured by an engine router.
pub type PathParams = Arc<[(String, String)]>;

pub fn empty_body() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync()
}

pub fn full_body(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed_unsync()
}

/// Boxes any `http-body` body into a [`Body`].
pub fn boxed_body<B>(body: B) -> Body
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

/// Caps `body` at `limit` bytes; reading past it yields [`Error::TooLarge`].
pub fn limit_body(body: Body, limit: usize) -> Body {
    Limited::new(body, limit)
        .map_err(move |err| {
            if err.is::<LengthLimitError>() {
                Box::new(Error::TooLarge { limit }) as BoxError
            } else {
                err
            }
        })
        .boxed_unsync()
}

/// Body whose first read fails with `err`.
pub(crate) fn failed_body(err: Error) -> Body {
    let frame = futures_util::future::ready(Err::<Frame<Bytes>, BoxError>(Box::new(err)));
    StreamBody::new(futures_util::stream::once(frame)).boxed_unsync()
}

/// Registration surface implemented by every engine adapter.
pub trait Transport {
    /// Registers `handler` for `method` and `path`, wrapped by `middlewares`
    /// with the first listed outermost.
    fn add_route(&mut self, method: Method, path: &str, handler: BoxHandler, middlewares: Vec<Middleware>);

    /// Registers middlewares that wrap every route, outside route middlewares.
    fn use_middleware(&mut self, middlewares: Vec<Middleware>);
}

/// Ingestion and result-writing strategies of a transport.
#[derive(Clone)]
pub struct Options {
    pub(crate) reader: Arc<dyn DataReader>,
    pub(crate) writer: Arc<dyn WriteResponse>,
    pub(crate) body_limit: usize,
}

impl Options {
    pub fn with_reader(mut self, reader: impl DataReader) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    pub fn with_writer(mut self, writer: impl WriteResponse) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    /// Largest request body handlers may read.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reader: Arc::new(JsonReader),
            writer: Arc::new(Negotiate),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::form::collect;

    #[tokio::test]
    async fn test_limit_body_rejects_oversized_body() {
        let err = collect(limit_body(full_body(vec![b'x'; 17]), 16)).await.unwrap_err();
        assert!(matches!(err, Error::TooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_limit_body_passes_body_at_limit() {
        let bytes = collect(limit_body(full_body(vec![b'x'; 16]), 16)).await.unwrap();
        assert_eq!(bytes.len(), 16);
    }

    #[tokio::test]
    async fn test_failed_body_surfaces_error() {
        let err = collect(failed_body(Error::TooLarge { limit: 8 })).await.unwrap_err();
        assert!(matches!(err, Error::TooLarge { limit: 8 }));
    }
}
