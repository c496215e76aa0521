//! Mosaic transport: write HTTP handlers once, serve them on any engine.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                    MOSAIC TRANSPORT                    │
//!                    │                                                        │
//!   native request   │  ┌───────────┐   ┌────────────┐   ┌───────────────┐   │
//!   ─────────────────┼─▶│  engines  │──▶│ middleware │──▶│    handler    │   │
//!                    │  │ (adapter) │   │   chain    │   │ (business)    │   │
//!                    │  └───────────┘   └────────────┘   └───────┬───────┘   │
//!                    │        ▲                                  │ Reply /   │
//!                    │        │                                  ▼ Error     │
//!   native response  │  ┌─────┴─────┐                    ┌───────────────┐   │
//!   ◀────────────────┼──│ Buffered  │◀───────────────────│   pipeline    │   │
//!                    │  │ Response  │                    │ (negotiation) │   │
//!                    │  └───────────┘                    └───────────────┘   │
//!                    │                                                        │
//!                    │  ┌──────────────────────────────────────────────────┐ │
//!                    │  │               Cross-Cutting Concerns              │ │
//!                    │  │   config   │   lifecycle   │   observability      │ │
//!                    │  └──────────────────────────────────────────────────┘ │
//!                    └───────────────────────────────────────────────────────┘
//! ```
//!
//! Engines: hyper (+ matchit), axum, poem and actix-web. Each one implements
//! [`Transport`] for registration and translates its native request into the
//! object-safe [`Request`] / [`Response`] contracts handlers are written against.

// Core contracts
pub mod error;
pub mod handler;
pub mod transport;

// Response and request processing
pub mod ingest;
pub mod negotiate;
pub mod pipeline;
pub mod reply;

// Engines and universal middleware
pub mod engines;
pub mod middleware;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use error::{BoxError, Error, Result};
pub use handler::{chain, compose, handler_fn, middleware_fn, BoxFuture, BoxHandler, Handler, Middleware};
pub use lifecycle::Shutdown;
pub use reply::{Data, Html, NoContent, Reply, Text, WithHeaders, WithStatus};
pub use transport::{Context, Options, Request, Response, Transport};
