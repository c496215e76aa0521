//! Per-call deadline.
//!
//! # Design Decisions
//! - The deadline is placed on a child of the call context, so handlers can
//!   observe it through `req.context()`
//! - When it passes the handler future is dropped and the call fails with 503

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;

use crate::error::Error;
use crate::handler::{handler_fn, middleware_fn, Middleware};

/// Fails calls running longer than `limit` with 503 Service Unavailable.
pub fn timeout(limit: Duration) -> Middleware {
    middleware_fn(move |next| {
        handler_fn(move |req, resp| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                let ctx = req.context().with_timeout(limit);
                let mut scoped = req.with_context(ctx.clone());

                match tokio::time::timeout(limit, next.call(&mut *scoped, resp)).await {
                    Ok(result) => result,
                    Err(_) => {
                        ctx.cancel();
                        tracing::warn!(limit_ms = limit.as_millis() as u64, "call deadline exceeded");
                        Err(Error::status(StatusCode::SERVICE_UNAVAILABLE, "request deadline exceeded"))
                    }
                }
            })
        })
    })
}
