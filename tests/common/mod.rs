//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use live_mock::net::BindPolicy;
use live_mock::{MockServer, ServerOptions};

/// Options tuned for tests: short drain, quick bind retries.
#[allow(dead_code)]
pub fn test_options() -> ServerOptions {
    ServerOptions {
        shutdown_grace: Duration::from_millis(200),
        bind_policy: BindPolicy {
            attempts: 100,
            delay: Duration::from_millis(20),
        },
        ..ServerOptions::default()
    }
}

/// Bind a server on an ephemeral loopback port without starting it.
#[allow(dead_code)]
pub async fn bound_server() -> Arc<MockServer> {
    Arc::new(
        MockServer::with_options("127.0.0.1:0", test_options())
            .await
            .unwrap(),
    )
}

/// Bind and start a server on an ephemeral loopback port.
#[allow(dead_code)]
pub async fn started_server() -> Arc<MockServer> {
    let server = bound_server().await;
    server.start().await.unwrap();
    server
}

/// Client without connection pooling, so restarts never reuse stale sockets.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn url(server: &MockServer, path: &str) -> String {
    format!("http://{}/{}", server.local_addr(), path.trim_start_matches('/'))
}
