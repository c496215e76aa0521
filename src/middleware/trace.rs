use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::handler::{handler_fn, middleware_fn, Middleware};

/// Opens a span per call and logs its outcome.
pub fn trace() -> Middleware {
    middleware_fn(|next| {
        handler_fn(move |req, resp| {
            let next = Arc::clone(&next);
            let span = tracing::info_span!(
                "call",
                method = %req.method(),
                path = %req.path(),
            );

            Box::pin(
                async move {
                    let started = Instant::now();
                    let result = next.call(req, resp).await;
                    let elapsed_ms = started.elapsed().as_millis() as u64;

                    match &result {
                        Ok(()) => tracing::info!(elapsed_ms, "call completed"),
                        Err(e) => tracing::warn!(elapsed_ms, error = %e, "call failed"),
                    }
                    result
                }
                .instrument(span),
            )
        })
    })
}
