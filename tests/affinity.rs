//! End-to-end affinity and balancing tests through the HTTP front end.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use pushmux::config::GatewayConfig;
use pushmux::http::HttpServer;
use pushmux::lifecycle::Shutdown;
use pushmux::pool::{strategy, PoolManager};
use url::Url;

mod common;

/// Start a gateway over the given backend URIs, returning the pool handle
/// for assertions.
async fn start_gateway(proxy_addr: SocketAddr, backend_uris: &[&str]) -> (Arc<PoolManager>, Shutdown) {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = proxy_addr.to_string();

    let pool = Arc::new(PoolManager::new(strategy::from_name("least").unwrap()));
    for uri in backend_uris {
        pool.add_resource(*uri, Url::parse(uri).unwrap());
    }

    let shutdown = Shutdown::new();
    let listener = tokio::net::TcpListener::bind(proxy_addr).await.unwrap();
    let server = HttpServer::new(&config, pool.clone());
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, receiver).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (pool, shutdown)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_repeated_pushes_stay_on_one_backend() {
    let b1: SocketAddr = "127.0.0.1:28191".parse().unwrap();
    let b2: SocketAddr = "127.0.0.1:28192".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28190".parse().unwrap();
    let hits1 = common::start_counting_backend(b1).await;
    let hits2 = common::start_counting_backend(b2).await;
    let (pool, _shutdown) = start_gateway(proxy, &[&format!("http://{b1}"), &format!("http://{b2}")]).await;

    let url = format!("http://{proxy}/metrics/job/nodeexporter/instance/host1");
    let client = client();
    for _ in 0..6 {
        let response = client.put(&url).send().await.unwrap();
        assert_eq!(response.status(), 200);
    }

    // all six pushes landed on one backend
    let (h1, h2) = (
        hits1.load(Ordering::SeqCst),
        hits2.load(Ordering::SeqCst),
    );
    assert_eq!(h1 + h2, 6);
    assert!(h1 == 6 || h2 == 6, "pushes split across backends: {h1}/{h2}");

    // one job entry, six counted requests
    let snap = pool.snapshot();
    let winner = snap.iter().find(|r| !r.jobs.is_empty()).unwrap();
    assert_eq!(winner.jobs.len(), 1);
    assert_eq!(winner.request_count, 6);
}

#[tokio::test]
async fn test_distinct_jobs_alternate_across_tied_backends() {
    let b1: SocketAddr = "127.0.0.1:28291".parse().unwrap();
    let b2: SocketAddr = "127.0.0.1:28292".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28290".parse().unwrap();
    let hits1 = common::start_counting_backend(b1).await;
    let hits2 = common::start_counting_backend(b2).await;
    let uri1 = format!("http://{b1}");
    let uri2 = format!("http://{b2}");
    let (pool, _shutdown) = start_gateway(proxy, &[&uri1, &uri2]).await;

    let client = client();
    let paths = [
        "/metrics/job/nodeexporter/instance/host1",
        "/metrics/job/cadvisor/instance/host1",
        "/metrics/job/nodeexporter/instance/host2",
        "/metrics/job/cadvisor/instance/host2",
    ];
    for path in paths {
        let response = client
            .put(format!("http://{proxy}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    // ties resolve to the higher index: placements go b2, b1, b2, b1
    assert_eq!(hits1.load(Ordering::SeqCst), 2);
    assert_eq!(hits2.load(Ordering::SeqCst), 2);
    for r in pool.snapshot() {
        assert_eq!(r.jobs.len(), 2);
        assert_eq!(r.request_count, 2);
    }
    // the very first assignment went to the second resource
    let snap = pool.snapshot();
    let second = snap.iter().find(|r| r.uri.starts_with(&uri2)).unwrap();
    assert_eq!(second.jobs[0].path, paths[0]);
}

#[tokio::test]
async fn test_delete_removes_affinity() {
    let b1: SocketAddr = "127.0.0.1:28391".parse().unwrap();
    let b2: SocketAddr = "127.0.0.1:28392".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28390".parse().unwrap();
    common::start_counting_backend(b1).await;
    common::start_counting_backend(b2).await;
    let (pool, _shutdown) = start_gateway(proxy, &[&format!("http://{b1}"), &format!("http://{b2}")]).await;

    let path = "/metrics/job/nodeexporter/instance/host1";
    let url = format!("http://{proxy}{path}");
    let client = client();
    client.put(&url).send().await.unwrap();
    client.put(&url).send().await.unwrap();
    assert!(pool.job_exists("127.0.0.1:1", path));

    let response = client.delete(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(!pool.job_exists("127.0.0.1:1", path));

    // the delete itself does not move the request counter
    let total: u64 = pool.snapshot().iter().map(|r| r.request_count).sum();
    assert_eq!(total, 2);

    // deleting again is a no-op, not an error
    let response = client.delete(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_empty_pool_returns_503() {
    let proxy: SocketAddr = "127.0.0.1:28490".parse().unwrap();
    let (pool, _shutdown) = start_gateway(proxy, &[]).await;

    let response = client()
        .put(format!("http://{proxy}/metrics/job/nodeexporter"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    assert!(pool.snapshot().is_empty());
}

#[tokio::test]
async fn test_status_endpoint_reports_pool() {
    let b1: SocketAddr = "127.0.0.1:28591".parse().unwrap();
    let proxy: SocketAddr = "127.0.0.1:28590".parse().unwrap();
    common::start_counting_backend(b1).await;
    let (_pool, _shutdown) = start_gateway(proxy, &[&format!("http://{b1}")]).await;

    let status: serde_json::Value = client()
        .get(format!("http://{proxy}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["strategy"], "least");
    assert_eq!(status["resources"].as_array().unwrap().len(), 1);
}
