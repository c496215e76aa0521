//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engines, pipeline and middleware produce:
//!     → tracing events and spans (per-call span from middleware::trace)
//!
//! logging.rs installs the subscriber:
//!     → stdout, human-readable or JSON lines
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of formatted messages
//! - Request ID flows through the per-call span

pub mod logging;

pub use logging::init;
