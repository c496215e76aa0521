//! Handler results and the optional capabilities the result pipeline looks for.
//!
//! # Responsibilities
//! - Define the capability traits a result may provide
//! - Provide ready-made result shapes (structured data, HTML templates, text)
//!
//! # Design Decisions
//! - Capabilities are discovered through `as_*` accessors returning `None` by default
//! - JSON and XML encoding is a result's own business; values that cannot be
//!   encoded report `EncodeError::Unsupported`

use std::io;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::error::{BoxError, Error};
use crate::transport::Context;

/// Supplies the status code of a result.
pub trait StatusCoder {
    fn status_code(&self) -> StatusCode;
}

/// Supplies extra response headers.
pub trait Headerer {
    fn headers(&self) -> HeaderMap;
}

/// Supplies raw bytes for a negotiated MIME type.
pub trait ByteReader {
    fn read_bytes(&self, mime: &str) -> Result<Bytes, BoxError>;
}

/// Renders itself into a writer, e.g. an HTML template.
pub trait Component {
    fn render(&self, ctx: &Context, w: &mut dyn io::Write) -> Result<(), BoxError>;
}

/// Structured encodings the pipeline can ask a result for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, EncodeError> {
        match self {
            Format::Json => Ok(serde_json::to_vec(value)?),
            Format::Xml => quick_xml::se::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| EncodeError::Xml(e.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Xml(String),
    #[error("{0} has no structured encoding")]
    Unsupported(&'static str),
}

/// A handler result.
pub trait Reply: Send + Sync {
    fn as_status_coder(&self) -> Option<&dyn StatusCoder> {
        None
    }

    fn as_headerer(&self) -> Option<&dyn Headerer> {
        None
    }

    fn as_byte_reader(&self) -> Option<&dyn ByteReader> {
        None
    }

    fn as_component(&self) -> Option<&dyn Component> {
        None
    }

    /// Error view, rendered as plain text when nothing better applies.
    fn as_error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }

    /// Whether this result stands for "nothing" (204).
    fn is_no_content(&self) -> bool {
        false
    }

    fn encode(&self, format: Format) -> Result<Vec<u8>, EncodeError> {
        let _ = format;
        Err(EncodeError::Unsupported(std::any::type_name::<Self>()))
    }
}

/// Structured data encoded as JSON or XML.
#[derive(Debug, Clone, PartialEq)]
pub struct Data<T>(pub T);

impl<T: Serialize + Send + Sync> Reply for Data<T> {
    fn encode(&self, format: Format) -> Result<Vec<u8>, EncodeError> {
        format.encode(&self.0)
    }
}

/// Explicitly empty result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

impl Reply for NoContent {
    fn is_no_content(&self) -> bool {
        true
    }
}

/// Plain text usable with every MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

#[derive(Serialize)]
#[serde(rename = "text")]
struct TextElement<'a> {
    #[serde(rename = "$text")]
    value: &'a str,
}

impl ByteReader for Text {
    fn read_bytes(&self, _mime: &str) -> Result<Bytes, BoxError> {
        Ok(Bytes::copy_from_slice(self.0.as_bytes()))
    }
}

impl Reply for Text {
    fn as_byte_reader(&self) -> Option<&dyn ByteReader> {
        Some(self)
    }

    fn encode(&self, format: Format) -> Result<Vec<u8>, EncodeError> {
        match format {
            Format::Json => format.encode(&self.0),
            Format::Xml => format.encode(&TextElement { value: &self.0 }),
        }
    }
}

/// Askama template rendered for HTML (and plain text) negotiations.
#[derive(Debug, Clone)]
pub struct Html<T>(pub T);

impl<T: askama::Template> Component for Html<T> {
    fn render(&self, _ctx: &Context, w: &mut dyn io::Write) -> Result<(), BoxError> {
        let rendered = self.0.render()?;
        w.write_all(rendered.as_bytes())?;
        Ok(())
    }
}

impl<T: askama::Template + Send + Sync> Reply for Html<T> {
    fn as_component(&self) -> Option<&dyn Component> {
        Some(self)
    }
}

/// Result with an explicit status code.
#[derive(Debug, Clone)]
pub struct WithStatus<R> {
    status: StatusCode,
    inner: R,
}

impl<R> WithStatus<R> {
    pub fn new(status: StatusCode, inner: R) -> Self {
        Self { status, inner }
    }
}

impl<R> StatusCoder for WithStatus<R> {
    fn status_code(&self) -> StatusCode {
        self.status
    }
}

impl<R: Reply> Reply for WithStatus<R> {
    fn as_status_coder(&self) -> Option<&dyn StatusCoder> {
        Some(self)
    }

    fn as_headerer(&self) -> Option<&dyn Headerer> {
        self.inner.as_headerer()
    }

    fn as_byte_reader(&self) -> Option<&dyn ByteReader> {
        self.inner.as_byte_reader()
    }

    fn as_component(&self) -> Option<&dyn Component> {
        self.inner.as_component()
    }

    fn as_error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.as_error()
    }

    fn is_no_content(&self) -> bool {
        self.inner.is_no_content()
    }

    fn encode(&self, format: Format) -> Result<Vec<u8>, EncodeError> {
        self.inner.encode(format)
    }
}

/// Result carrying extra response headers.
#[derive(Debug, Clone)]
pub struct WithHeaders<R> {
    headers: HeaderMap,
    inner: R,
}

impl<R> WithHeaders<R> {
    pub fn new(headers: HeaderMap, inner: R) -> Self {
        Self { headers, inner }
    }
}

impl<R> Headerer for WithHeaders<R> {
    fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }
}

impl<R: Reply> Reply for WithHeaders<R> {
    fn as_status_coder(&self) -> Option<&dyn StatusCoder> {
        self.inner.as_status_coder()
    }

    fn as_headerer(&self) -> Option<&dyn Headerer> {
        Some(self)
    }

    fn as_byte_reader(&self) -> Option<&dyn ByteReader> {
        self.inner.as_byte_reader()
    }

    fn as_component(&self) -> Option<&dyn Component> {
        self.inner.as_component()
    }

    fn as_error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.as_error()
    }

    fn is_no_content(&self) -> bool {
        self.inner.is_no_content()
    }

    fn encode(&self, format: Format) -> Result<Vec<u8>, EncodeError> {
        self.inner.encode(format)
    }
}

#[derive(Serialize)]
#[serde(rename = "error")]
struct ErrorBody {
    error: String,
}

impl StatusCoder for Error {
    fn status_code(&self) -> StatusCode {
        Error::status_code(self)
    }
}

impl Reply for Error {
    fn as_status_coder(&self) -> Option<&dyn StatusCoder> {
        match self {
            Error::Status { .. } | Error::TooLarge { .. } => Some(self),
            _ => None,
        }
    }

    fn as_error(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self)
    }

    fn encode(&self, format: Format) -> Result<Vec<u8>, EncodeError> {
        format.encode(&ErrorBody {
            error: self.to_string(),
        })
    }
}
