//! Default result-writing pipeline.
//!
//! # Responsibilities
//! - Negotiate the response MIME type from `Accept`
//! - Pick status, headers and body from the capabilities a result provides
//!
//! # Design Decisions
//! - An absent result answers 204 and nothing else is written
//! - Status precedence: the result's own status, 500 for errors, then 200
//! - Encoding failures become a plain-text 500 carrying the encoder's message
//! - A component that fails after committing keeps the committed status; the
//!   failure message is appended to the body already written

use std::fmt::Display;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use tracing::warn;

use crate::negotiate::{self, JSON, OFFERED, TEXT, XML};
use crate::reply::{Format, Reply};
use crate::transport::{copy_headers, Request, Response, ResponseWriter};

/// Strategy turning a handler result into a response.
pub trait WriteResponse: Send + Sync + 'static {
    fn write(&self, req: &dyn Request, resp: &mut dyn Response, data: Option<&dyn Reply>);
}

/// Content-negotiating pipeline used unless a transport is configured otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Negotiate;

impl WriteResponse for Negotiate {
    fn write(&self, req: &dyn Request, resp: &mut dyn Response, data: Option<&dyn Reply>) {
        write_response(req, resp, data);
    }
}

/// Runs the negotiation pipeline for one result.
pub fn write_response(req: &dyn Request, resp: &mut dyn Response, data: Option<&dyn Reply>) {
    let accept = req.header(http::header::ACCEPT.as_str()).unwrap_or_default();
    let mime = negotiate::negotiate(accept, &OFFERED, JSON);
    resp.set_header(CONTENT_TYPE, HeaderValue::from_static(mime));

    let data = match data {
        Some(data) if !data.is_no_content() => data,
        _ => {
            resp.write_header(StatusCode::NO_CONTENT);
            return;
        }
    };

    let status = status_of(data);
    if let Some(headerer) = data.as_headerer() {
        copy_headers(resp, &headerer.headers());
    }

    match mime {
        JSON => write_encoded(resp, data, Format::Json, status),
        XML => write_encoded(resp, data, Format::Xml, status),
        _ => write_shaped(req, resp, data, mime, status),
    }
}

fn status_of(data: &dyn Reply) -> StatusCode {
    if let Some(coder) = data.as_status_coder() {
        coder.status_code()
    } else if data.as_error().is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

fn write_encoded(resp: &mut dyn Response, data: &dyn Reply, format: Format, status: StatusCode) {
    match data.encode(format) {
        Ok(body) => {
            resp.set_body(&body, status);
        }
        Err(err) => write_failure(resp, &err),
    }
}

fn write_shaped(req: &dyn Request, resp: &mut dyn Response, data: &dyn Reply, mime: &'static str, status: StatusCode) {
    if let Some(reader) = data.as_byte_reader() {
        match reader.read_bytes(mime) {
            Ok(bytes) => {
                resp.set_body(&bytes, status);
            }
            Err(err) => write_failure(resp, &err),
        }
    } else if let Some(component) = data.as_component() {
        resp.write_header(status);
        let rendered = component.render(req.context(), &mut ResponseWriter::new(&mut *resp));
        if let Err(err) = rendered {
            write_failure(resp, &err);
        }
    } else if let Some(err) = data.as_error() {
        resp.set_header(CONTENT_TYPE, HeaderValue::from_static(TEXT));
        resp.set_body(err.to_string().as_bytes(), status);
    } else {
        resp.set_header(CONTENT_TYPE, HeaderValue::from_static(TEXT));
        resp.write_header(StatusCode::NOT_ACCEPTABLE);
    }
}

fn write_failure(resp: &mut dyn Response, err: &dyn Display) {
    let message = err.to_string();
    warn!(error = %message, "failed to write response");
    resp.set_header(CONTENT_TYPE, HeaderValue::from_static(TEXT));
    resp.set_body(message.as_bytes(), StatusCode::INTERNAL_SERVER_ERROR);
}
