//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a mock push backend that answers 200 to everything and counts the
/// requests it served.
pub async fn start_counting_backend(addr: SocketAddr) -> Arc<AtomicU32> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        // drain the request head before answering
                        let mut buf = [0u8; 65536];
                        let _ = socket.read(&mut buf).await;
                        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        let body = "ok";
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    hits
}
