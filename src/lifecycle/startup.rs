//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener named by the configuration
//! - Build the configured engine's transport and let the caller register routes on it
//! - Serve until the shutdown coordinator fires
//!
//! # Design Decisions
//! - Fail fast: route table and bind errors are returned before any traffic
//! - Routes are registered through `&mut dyn Transport`, so the same
//!   registration code runs on every engine
//! - Every engine enforces the configured request body limit
//! - The actix engine needs an actix system; the caller picks the runtime

use ::actix_web::{App, HttpServer};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{Engine, ServerConfig};
use crate::engines::actix::ActixTransport;
use crate::engines::axum::AxumTransport;
use crate::engines::hyper::HyperTransport;
use crate::engines::poem::PoemTransport;
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::transport::{Options, Transport};

/// Binds the configured listener address.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(Error::other)
}

/// Serves the routes added by `register` on the configured engine.
pub async fn serve<R>(config: &ServerConfig, listener: TcpListener, shutdown: &Shutdown, register: R) -> Result<()>
where
    R: FnOnce(&mut dyn Transport),
{
    let addr = listener.local_addr().map_err(Error::other)?;
    info!(engine = %config.engine, address = %addr, "starting transport");
    let options = Options::default().with_body_limit(config.limits.max_body_bytes);

    match config.engine {
        Engine::Hyper => {
            let mut transport = HyperTransport::with_options(options);
            register(&mut transport);
            transport.serve(listener, shutdown.signal()).await
        }
        Engine::Axum => {
            let mut transport = AxumTransport::default().with_options(options);
            register(&mut transport);
            let router = transport.into_router()?;
            ::axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.signal())
                .await
                .map_err(Error::other)
        }
        Engine::Poem => {
            let mut transport = PoemTransport::with_options(options);
            register(&mut transport);
            let route = transport.into_route()?;
            let acceptor = ::poem::listener::TcpAcceptor::from_tokio(listener).map_err(Error::other)?;
            ::poem::Server::new_with_acceptor(acceptor)
                .run_with_graceful_shutdown(route, shutdown.signal(), None)
                .await
                .map_err(Error::other)
        }
        Engine::Actix => {
            let mut transport = ActixTransport::new().with_options(options);
            register(&mut transport);
            let configurator = transport.into_configurator()?;
            let std_listener = listener.into_std().map_err(Error::other)?;

            let server = HttpServer::new(move || App::new().configure(configurator.clone()))
                .disable_signals()
                .listen(std_listener)
                .map_err(Error::other)?
                .run();
            let handle = server.handle();

            tokio::select! {
                result = server => result.map_err(Error::other),
                _ = shutdown.signal() => {
                    info!("actix transport shutting down");
                    handle.stop(true).await;
                    Ok(())
                }
            }
        }
    }
}
