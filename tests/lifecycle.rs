//! Startup and shutdown behaviour of the whole process.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use serde_json::json;

use rpc_gateway::http::GatewayServer;
use rpc_gateway::lifecycle::{supervise, Gateway, Shutdown};
use rpc_gateway::net::ListenerRole;
use rpc_gateway::{GatewayConfig, LifecycleError, StartupError};

mod common;
use common::{Behavior, MockUpstream};

fn local_config(root: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.gateway.bind_address = "127.0.0.1:0".to_string();
    config.assets.bind_address = "127.0.0.1:0".to_string();
    config.assets.swagger_ui_dir = root.join("swaggerui");
    config.assets.schema_dir = root.to_path_buf();
    config.ruleset.path = root.join("ruleset.toml");
    config.upstream.connect_timeout_secs = 1;
    config
}

/// Write the demo descriptor set and a ruleset file pointing at it.
fn write_ruleset(root: &Path) {
    fs::write(root.join("demo.pb"), common::demo_file_set().encode_to_vec()).unwrap();
    fs::write(
        root.join("ruleset.toml"),
        format!("descriptor_set = \"demo.pb\"\n{}", common::DEMO_RULESET),
    )
    .unwrap();
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_missing_ruleset_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let result = Gateway::start(&config, Shutdown::new()).await;
    assert!(matches!(result, Err(StartupError::Ruleset(_))));
}

#[tokio::test]
async fn test_unreachable_upstream_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    write_ruleset(dir.path());
    let mut config = local_config(dir.path());
    config.upstream.address = format!("127.0.0.1:{}", free_port());

    let result = Gateway::start(&config, Shutdown::new()).await;
    assert!(matches!(result, Err(StartupError::Upstream(_))));
}

#[tokio::test]
async fn test_occupied_port_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = local_config(dir.path());
    config.gateway.bind_address = taken.local_addr().unwrap().to_string();

    let mock = MockUpstream::replying("demo.v1.Item", json!({}));
    let result = Gateway::with_upstream(&config, common::ruleset(), mock, Shutdown::new()).await;
    assert!(matches!(result, Err(StartupError::Listener(_))));
}

#[tokio::test]
async fn test_serves_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let shutdown = Shutdown::new();

    let mock = MockUpstream::replying("demo.v1.Item", json!({"name": "widget"}));
    let gateway = Gateway::with_upstream(&config, common::ruleset(), mock.clone(), shutdown.clone())
        .await
        .unwrap();
    let addr = gateway.gateway_addr().unwrap();
    let assets = gateway.assets_addr().unwrap();
    let serving = tokio::spawn(gateway.serve());

    let response = reqwest::get(format!("http://{}/v1/items/42", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>().await.unwrap(), json!({"name": "widget"}));
    assert_eq!(mock.calls().len(), 1);

    let response = reqwest::get(format!("http://{}/v1/items/42", assets)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), serving).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_call() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let shutdown = Shutdown::new();

    let mock = MockUpstream::new(Behavior::Hang);
    let gateway = Gateway::with_upstream(&config, common::ruleset(), mock.clone(), shutdown.clone())
        .await
        .unwrap();
    let addr = gateway.gateway_addr().unwrap();
    let serving = tokio::spawn(gateway.serve());

    let pending = tokio::spawn(reqwest::get(format!("http://{}/v1/items/1", addr)));
    mock.wait_for_calls(1).await;
    shutdown.trigger();

    let response = pending.await.unwrap().unwrap();
    assert_eq!(response.status().as_u16(), 499);
    assert!(mock.observed_cancel());

    let result = tokio::time::timeout(Duration::from_secs(5), serving).await.unwrap().unwrap();
    assert!(result.is_ok());
}

/// A gateway listener on an ephemeral port plus its serve future.
async fn gateway_listener(
    shutdown: &Shutdown,
) -> (std::net::SocketAddr, impl std::future::Future<Output = io::Result<()>>) {
    let mock = MockUpstream::replying("demo.v1.Item", json!({"name": "widget"}));
    let server = GatewayServer::new(
        Arc::new(common::router(mock)),
        shutdown.subscribe(),
        Duration::from_secs(5),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (addr, server.run(listener, shutdown.subscribe()))
}

async fn failing_assets() -> io::Result<()> {
    Err(io::Error::other("asset root vanished"))
}

#[tokio::test]
async fn test_optional_asset_failure_keeps_gateway_serving() {
    let shutdown = Shutdown::new();
    let (addr, gateway) = gateway_listener(&shutdown).await;
    let serving = tokio::spawn(supervise(gateway, failing_assets(), false, shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!serving.is_finished());
    assert!(!shutdown.is_triggered());

    let response = reqwest::get(format!("http://{}/v1/items/1", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), serving).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_required_asset_failure_stops_gateway() {
    let shutdown = Shutdown::new();
    let (addr, gateway) = gateway_listener(&shutdown).await;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        supervise(gateway, failing_assets(), true, shutdown.clone()),
    )
    .await
    .unwrap();

    assert!(matches!(
        result,
        Err(LifecycleError::ListenerFatal {
            role: ListenerRole::Assets,
            ..
        })
    ));
    assert!(shutdown.is_triggered());
    assert!(reqwest::get(format!("http://{}/v1/items/1", addr)).await.is_err());
}
