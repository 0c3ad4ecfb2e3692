//! Shared helpers for unit tests

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Plain client, no timeouts of its own
pub(crate) fn test_client() -> reqwest::Client {
    reqwest::Client::builder().build().unwrap()
}

/// Server that sends a 200 status line and two body bytes of a promised 64, then stalls
///
/// Mimics a target that answers quickly but never finishes its body.
pub(crate) async fn spawn_stalled_body_server(stall: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 64\r\n\r\nOK")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(stall).await;
            });
        }
    });

    format!("http://{addr}")
}

/// URL of a local port nothing listens on
pub(crate) async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

/// Server that answers every request with `status_line` and `body`, sending the head
/// after `head_delay` and the body `body_delay` later
pub(crate) async fn spawn_split_response_server(
    status_line: &'static str,
    head_delay: Duration,
    body_delay: Duration,
    body: &'static [u8],
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;

                tokio::time::sleep(head_delay).await;
                let head = format!("{status_line}\r\nContent-Length: {}\r\n\r\n", body.len());
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.flush().await;

                tokio::time::sleep(body_delay).await;
                let _ = socket.write_all(body).await;
                let _ = socket.flush().await;

                // Hold the connection until the client is done with it
                let _ = socket.read(&mut buf).await;
            });
        }
    });

    format!("http://{addr}")
}
