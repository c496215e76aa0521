//! mosaic-demo: a small user API served through the universal transport.
//!
//! The same registration code runs on every engine; pick one with
//! `--engine` or the `engine` key of the config file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use http::{Method, StatusCode};
use mosaic_transport::config::validation::validate_config;
use mosaic_transport::config::{load_config, ConfigError, Engine, ServerConfig};
use mosaic_transport::lifecycle::{forward_signals, startup, Shutdown};
use mosaic_transport::middleware::{request_id, timeout, trace};
use mosaic_transport::transport::Transport;
use mosaic_transport::{handler_fn, observability, BoxHandler, Data, Error, Html, WithStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "mosaic-demo")]
#[command(about = "Demo user API served through the mosaic transport", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine override.
    #[arg(short, long, value_enum)]
    engine: Option<Engine>,

    /// Bind address override (e.g. 127.0.0.1:8080).
    #[arg(short, long)]
    bind: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(engine) = cli.engine {
        config.engine = engine;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    observability::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        engine = %config.engine,
        bind_address = %config.listener.bind_address,
        "mosaic-demo starting"
    );

    // actix-web runs its workers on an actix system; the other engines on a plain tokio runtime.
    match config.engine {
        Engine::Actix => actix_web::rt::System::new().block_on(run(config))?,
        _ => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(run(config))?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run(config: ServerConfig) -> mosaic_transport::Result<()> {
    let shutdown = Shutdown::new();
    tokio::spawn(forward_signals(shutdown.clone()));

    let listener = startup::bind(&config).await?;
    let api = DemoApi::new(&config);
    startup::serve(&config, listener, &shutdown, |transport| api.register(transport)).await
}

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

#[derive(askama::Template)]
#[template(path = "home.html")]
struct Home {
    engine: String,
}

#[derive(Default)]
struct UserStore {
    next_id: u64,
    users: HashMap<u64, User>,
}

struct DemoApi {
    engine: Engine,
    max_multipart_memory: u64,
    store: Arc<RwLock<UserStore>>,
}

impl DemoApi {
    fn new(config: &ServerConfig) -> Self {
        Self {
            engine: config.engine,
            max_multipart_memory: config.limits.max_multipart_memory,
            store: Arc::new(RwLock::new(UserStore::default())),
        }
    }

    fn register(&self, transport: &mut dyn Transport) {
        transport.use_middleware(vec![request_id(), trace(), timeout(Duration::from_secs(10))]);

        let user_path = format!("/users/{}", self.engine.path_param("id"));
        transport.add_route(Method::GET, "/", self.home(), vec![]);
        transport.add_route(Method::GET, "/health", health(), vec![]);
        transport.add_route(Method::GET, &user_path, self.get_user(), vec![]);
        transport.add_route(Method::POST, "/users", self.create_user(), vec![]);
        transport.add_route(Method::POST, "/avatars", self.upload_avatar(), vec![]);
    }

    fn home(&self) -> BoxHandler {
        let engine = self.engine.to_string();
        handler_fn(move |req, resp| {
            let page = Html(Home { engine: engine.clone() });
            Box::pin(async move {
                resp.write_data(req, &page);
                Ok(())
            })
        })
    }

    fn get_user(&self) -> BoxHandler {
        let store = Arc::clone(&self.store);
        handler_fn(move |req, resp| {
            let store = Arc::clone(&store);
            Box::pin(async move {
                let id: u64 = req
                    .path_value("id")
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(|| Error::status(StatusCode::BAD_REQUEST, "invalid user id"))?;

                let user = store
                    .read()
                    .await
                    .users
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| Error::status(StatusCode::NOT_FOUND, format!("user {id} not found")))?;

                resp.write_data(req, &Data(user));
                Ok(())
            })
        })
    }

    fn create_user(&self) -> BoxHandler {
        let store = Arc::clone(&self.store);
        handler_fn(move |req, resp| {
            let store = Arc::clone(&store);
            Box::pin(async move {
                let new_user: NewUser = req
                    .read_data()
                    .await
                    .map_err(|e| Error::status(StatusCode::BAD_REQUEST, e.to_string()))?;
                if new_user.name.trim().is_empty() {
                    return Err(Error::status(StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty"));
                }

                let user = {
                    let mut store = store.write().await;
                    store.next_id += 1;
                    let user = User {
                        id: store.next_id,
                        name: new_user.name,
                    };
                    store.users.insert(user.id, user.clone());
                    user
                };

                tracing::info!(user_id = user.id, "user created");
                resp.write_data(req, &WithStatus::new(StatusCode::CREATED, Data(user)));
                Ok(())
            })
        })
    }

    fn upload_avatar(&self) -> BoxHandler {
        let max_memory = self.max_multipart_memory;
        handler_fn(move |req, resp| {
            Box::pin(async move {
                let form = req
                    .multipart_form(max_memory)
                    .await
                    .map_err(|e| Error::status(StatusCode::BAD_REQUEST, e.to_string()))?;
                let (_, header) = form
                    .file("avatar")
                    .map_err(|e| Error::status(StatusCode::BAD_REQUEST, e.to_string()))?;

                let summary = serde_json::json!({
                    "filename": header.filename,
                    "size": header.size,
                    "content_type": header.content_type,
                    "owner": form.value("owner"),
                });
                resp.write_data(req, &Data(summary));
                Ok(())
            })
        })
    }
}

fn health() -> BoxHandler {
    handler_fn(|req, resp| {
        Box::pin(async move {
            resp.write_data(req, &Data(serde_json::json!({ "status": "ok" })));
            Ok(())
        })
    })
}
