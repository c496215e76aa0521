//! Engine-neutral middlewares.
//!
//! # Data Flow
//! ```text
//! request_id  → ensure X-Request-ID, echo it on the response
//!     → trace → span per call, completion/failure events
//!     → timeout → deadline on the call context, 503 when it passes
//!     → handler
//! ```
//!
//! Each one is a plain [`Middleware`](crate::handler::Middleware) and runs
//! unchanged on every engine adapter.

mod request_id;
mod timeout;
mod trace;

pub use request_id::{request_id, X_REQUEST_ID};
pub use timeout::timeout;
pub use trace::trace;
