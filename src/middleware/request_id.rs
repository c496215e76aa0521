//! Request ID propagation.
//!
//! # Design Decisions
//! - An incoming `X-Request-ID` is kept; otherwise a UUID v4 is generated
//! - The ID is echoed on the response before the handler runs, so it
//!   survives handler errors
//! - The rest of the chain runs inside a `request` span carrying the ID

use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use tracing::Instrument;
use uuid::Uuid;

use crate::handler::{handler_fn, middleware_fn, Middleware};

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Ensures every call has a request ID and echoes it on the response.
pub fn request_id() -> Middleware {
    middleware_fn(|next| {
        handler_fn(move |req, resp| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                let id = req
                    .header(X_REQUEST_ID.as_str())
                    .map(str::to_owned)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());

                match HeaderValue::from_str(&id) {
                    Ok(value) => resp.set_header(X_REQUEST_ID, value),
                    Err(_) => tracing::debug!(request_id = %id, "request ID is not a valid header value"),
                }

                let span = tracing::info_span!("request", request_id = %id);
                next.call(req, resp).instrument(span).await
            })
        })
    })
}
