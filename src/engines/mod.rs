//! Engine adapters.
//!
//! | Module   | Engine     | Route parameters | Foreign middleware bridge             |
//! |----------|------------|------------------|---------------------------------------|
//! | `hyper`  | hyper 1    | `/users/{id}`    | tower `Layer` (`from_layer`)          |
//! | `axum`   | axum 0.8   | `/users/{id}`    | tower `Layer` (`from_layer`)          |
//! | `poem`   | poem 3     | `/users/:id`     | poem `Middleware` (`from_middleware`) |
//! | `actix`  | actix-web 4| `/users/{id}`    | actix `Transform` (`from_transform`)  |
//!
//! Every adapter runs the same handler values and writes byte-identical
//! bodies and statuses for the same inputs.

pub mod actix;
pub mod axum;
pub mod hyper;
pub mod poem;

use http::Method;

use crate::error::{Error, Result};
use crate::handler::{chain, BoxHandler, Middleware};

struct RouteSpec {
    method: Method,
    path: String,
    handler: BoxHandler,
    middlewares: Vec<Middleware>,
}

/// Routes registered on an adapter before its native router is built.
#[derive(Default)]
pub(crate) struct RouteTable {
    routes: Vec<RouteSpec>,
}

/// Handlers sharing one path, already wrapped in their middlewares.
pub(crate) struct CompiledPath {
    pub(crate) path: String,
    pub(crate) methods: Vec<(Method, BoxHandler)>,
}

impl RouteTable {
    pub(crate) fn push(&mut self, method: Method, path: &str, handler: BoxHandler, middlewares: Vec<Middleware>) {
        self.routes.push(RouteSpec {
            method,
            path: path.to_owned(),
            handler,
            middlewares,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    /// Groups routes by path, wrapping each handler in `globals` then its own middlewares.
    pub(crate) fn compile(self, globals: &[Middleware]) -> Result<Vec<CompiledPath>> {
        let mut compiled: Vec<CompiledPath> = Vec::new();

        for route in self.routes {
            let stack: Vec<Middleware> = globals.iter().cloned().chain(route.middlewares).collect();
            let handler = chain(route.handler, &stack);

            let index = match compiled.iter().position(|c| c.path == route.path) {
                Some(index) => index,
                None => {
                    compiled.push(CompiledPath {
                        path: route.path.clone(),
                        methods: Vec::new(),
                    });
                    compiled.len() - 1
                }
            };

            let entry = &mut compiled[index];
            if entry.methods.iter().any(|(method, _)| *method == route.method) {
                return Err(Error::Route {
                    path: route.path,
                    reason: format!("{} registered twice", route.method),
                });
            }
            entry.methods.push((route.method, handler));
        }

        Ok(compiled)
    }
}
