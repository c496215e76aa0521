//! Form parsing shared by the adapters.
//!
//! # Responsibilities
//! - Parse `multipart/form-data` bodies into values and in-memory files
//! - Parse `application/x-www-form-urlencoded` bodies merged with the query string
//!
//! # Design Decisions
//! - Multipart parsing is bounded by `max_memory`; larger bodies fail instead of spilling to disk
//! - Only POST, PUT and PATCH bodies contribute url-encoded values

use std::collections::HashMap;
use std::io::Cursor;

use bytes::Bytes;
use http::Method;
use http_body_util::BodyExt;
use multer::{Constraints, Multipart, SizeLimit};

use super::{Body, Request, Values};
use crate::error::{BoxError, Error, Result};
use crate::handler::BoxFuture;

/// Reader over an uploaded file held in memory.
pub type FileReader = Cursor<Bytes>;

/// Metadata of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub filename: String,
    pub size: u64,
    pub content_type: Option<String>,
}

/// A parsed multipart form.
pub trait Form: Send + Sync {
    /// First value of the text field `name`.
    fn value(&self, name: &str) -> Option<&str>;

    /// All text fields.
    fn values(&self) -> &Values;

    /// First file uploaded under `name`, or [`Error::MissingFile`].
    fn file(&self, name: &str) -> Result<(FileReader, &FileHeader)>;
}

#[derive(Debug)]
struct FilePart {
    header: FileHeader,
    content: Bytes,
}

/// In-memory multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    values: Values,
    files: HashMap<String, Vec<FilePart>>,
}

impl MultipartForm {
    /// Parses a multipart body announced by `content_type`.
    pub async fn parse(content_type: Option<&str>, body: Body, max_memory: u64) -> Result<Self> {
        let content_type = content_type.ok_or_else(|| Error::Form("request Content-Type isn't multipart/form-data".into()))?;
        let boundary = multer::parse_boundary(content_type).map_err(form_error)?;

        let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(max_memory));
        let mut multipart = Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await.map_err(form_error)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let filename = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(|mime| mime.to_string());

            match filename {
                Some(filename) => {
                    let content = field.bytes().await.map_err(form_error)?;
                    let header = FileHeader {
                        filename,
                        size: content.len() as u64,
                        content_type,
                    };
                    form.files.entry(name).or_default().push(FilePart { header, content });
                }
                None => {
                    let text = field.text().await.map_err(form_error)?;
                    form.values.add(name, text);
                }
            }
        }

        tracing::debug!(
            fields = form.values.len(),
            files = form.files.len(),
            "multipart form parsed"
        );
        Ok(form)
    }
}

impl Form for MultipartForm {
    fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name)
    }

    fn values(&self) -> &Values {
        &self.values
    }

    fn file(&self, name: &str) -> Result<(FileReader, &FileHeader)> {
        let part = self
            .files
            .get(name)
            .and_then(|parts| parts.first())
            .ok_or(Error::MissingFile)?;
        Ok((Cursor::new(part.content.clone()), &part.header))
    }
}

/// Whether `method` and `content_type` announce an url-encoded body.
fn is_urlencoded(method: &Method, content_type: Option<&str>) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
        && content_type
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}

/// Url-encoded body values followed by query values.
///
/// The body is only taken when it is url-encoded, so other bodies stay
/// readable afterwards.
pub(crate) fn read_urlencoded(req: &mut dyn Request) -> BoxFuture<'static, Result<Values>> {
    let query = req.queries();
    let urlencoded = is_urlencoded(req.method(), req.header(http::header::CONTENT_TYPE.as_str()));
    let body = urlencoded.then(|| req.body());
    Box::pin(parse_urlencoded(body, query))
}

async fn parse_urlencoded(body: Option<Body>, query: Values) -> Result<Values> {
    let mut values = Values::new();
    if let Some(body) = body {
        let bytes = collect(body).await?;
        let raw = std::str::from_utf8(&bytes).map_err(|e| Error::Form(Box::new(e)))?;
        values = Values::parse(raw);
    }
    values.merge(query);
    Ok(values)
}

/// Buffers a whole body.
pub(crate) async fn collect(body: Body) -> Result<Bytes> {
    Ok(body.collect().await.map_err(body_error)?.to_bytes())
}

/// Unwraps crate errors raised inside a body stream, such as the body limit.
fn body_error(err: BoxError) -> Error {
    match err.downcast::<Error>() {
        Ok(err) => *err,
        Err(err) => Error::Body(err),
    }
}

fn form_error(err: multer::Error) -> Error {
    match err {
        multer::Error::StreamReadFailed(source) => body_error(source),
        other => Error::Form(Box::new(other)),
    }
}
