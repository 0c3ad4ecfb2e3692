//! Common test utilities for fanout integration tests

#![allow(dead_code)]

use fanout::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A fanout server running on an ephemeral local port
pub struct TestServer {
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<fanout::Result<()>>,
}

impl TestServer {
    /// Start a server with `config` on 127.0.0.1:0
    pub async fn start(config: Config) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(fanout::api::serve(
            listener,
            Arc::new(config),
            async move {
                let _ = stopped.await;
            },
        ));

        Self {
            addr,
            stop: Some(stop),
            handle,
        }
    }

    /// Full URL of `path_and_query` on this server
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    /// Trigger graceful shutdown and wait for the server task
    pub async fn stop(mut self) -> fanout::Result<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .unwrap()
            .unwrap()
    }
}

/// Mount `GET route` answering 200 with `body` after `delay`
pub async fn mount_ok(server: &MockServer, route: &str, body: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}
