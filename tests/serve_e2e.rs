//! Real servers on loopback sockets, driven over HTTP with reqwest.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use mosaic_transport::config::{Engine, ServerConfig};
use mosaic_transport::engines::hyper::HyperTransport;
use mosaic_transport::lifecycle::{startup, Shutdown};
use mosaic_transport::transport::Transport;
use mosaic_transport::{handler_fn, Text};

use common::{register, User};

mod common;

async fn exercise_client(addr: SocketAddr) {
    let url = |path: &str| format!("http://{addr}{path}");
    let client = reqwest::Client::new();

    let resp = client.get(url("/users/12")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let traces: Vec<_> = resp
        .headers()
        .get_all("x-trace")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(traces, ["global", "route"]);
    let user: User = resp.json().await.unwrap();
    assert_eq!(
        user,
        User {
            id: 12,
            name: "user-12".into()
        }
    );

    let resp = client
        .post(url("/users"))
        .json(&serde_json::json!({ "name": "grace" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(resp.text().await.unwrap(), r#"{"id":1,"name":"grace"}"#);

    let resp = client
        .get(url("/conflict"))
        .header("accept", "text/plain")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    assert_eq!(resp.text().await.unwrap(), "user already exists");
}

/// Serves `engine` on an ephemeral port, runs the client checks, then shuts down.
async fn exercise(engine: Engine) {
    let mut config = ServerConfig::default();
    config.engine = engine;
    config.listener.bind_address = "127.0.0.1:0".to_string();

    let listener = startup::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let serving = startup::serve(&config, listener, &shutdown, |t| register(t, engine));
    let client = async {
        exercise_client(addr).await;
        shutdown.trigger();
    };

    let (served, ()) = tokio::time::timeout(Duration::from_secs(10), async { tokio::join!(serving, client) })
        .await
        .expect("server did not stop");
    assert!(served.is_ok(), "server failed: {served:?}");
}

#[tokio::test]
async fn test_hyper_serves_until_shutdown() {
    exercise(Engine::Hyper).await;
}

#[tokio::test]
async fn test_axum_serves_until_shutdown() {
    exercise(Engine::Axum).await;
}

#[tokio::test]
async fn test_poem_serves_until_shutdown() {
    exercise(Engine::Poem).await;
}

#[tokio::test]
async fn test_hyper_drains_in_flight_request() {
    let finished = Arc::new(AtomicBool::new(false));
    let mut transport = HyperTransport::new();
    let flag = Arc::clone(&finished);
    transport.add_route(
        Method::GET,
        "/report",
        handler_fn(move |req, resp| {
            let flag = Arc::clone(&flag);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                flag.store(true, Ordering::SeqCst);
                resp.write_data(req, &Text("drained".into()));
                Ok(())
            })
        }),
        vec![],
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let serving = async {
        let served = transport.serve(listener, shutdown.signal()).await;
        (served, finished.load(Ordering::SeqCst))
    };
    let client = async {
        reqwest::Client::new()
            .get(format!("http://{addr}/report"))
            .header("accept", "text/plain")
            .send()
            .await
            .unwrap()
    };
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.trigger();
    };

    let ((served, finished_before_return), resp, ()) =
        tokio::time::timeout(Duration::from_secs(10), async { tokio::join!(serving, client, trigger) })
            .await
            .expect("server did not stop");
    assert!(served.is_ok(), "server failed: {served:?}");
    assert!(finished_before_return);
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "drained");
}

#[tokio::test]
async fn test_bind_reports_bad_address() {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "256.0.0.1:80".to_string();

    assert!(startup::bind(&config).await.is_err());
}
