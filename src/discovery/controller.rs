//! Membership controller: keeps the pool in agreement with discovery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use url::Url;

use crate::discovery::{DiscoveryEvent, ResourceDiscovery};
use crate::error::GatewayError;
use crate::pool::PoolManager;

/// Reconciles pool membership: bounded-retry bulk discovery at startup,
/// incremental add/remove events afterwards.
pub struct MembershipController {
    pool: Arc<PoolManager>,
    retries: u32,
    retry_timeout: Duration,
}

impl MembershipController {
    pub fn new(pool: Arc<PoolManager>, retries: u32, retry_timeout: Duration) -> Self {
        Self {
            pool,
            retries,
            retry_timeout,
        }
    }

    /// Seed the pool from bulk enumeration. Empty results and transport
    /// errors are retried up to the configured attempt count, sleeping
    /// `retry_timeout` between attempts. Exhaustion is fatal to startup.
    pub async fn bootstrap<D: ResourceDiscovery>(&self, source: &D) -> Result<(), GatewayError> {
        for attempt in 1..=self.retries {
            match source.enumerate().await {
                Ok(uris) if !uris.is_empty() => {
                    for (uri, id) in uris {
                        match Url::parse(&uri) {
                            Ok(url) => self.pool.add_resource(id, url),
                            Err(e) => {
                                tracing::warn!(
                                    uri = %uri,
                                    resource = %id,
                                    error = %e,
                                    "discovered resource has unusable uri, skipping"
                                );
                            }
                        }
                    }
                    tracing::info!(
                        attempt,
                        resources = self.pool.resource_count(),
                        "bulk discovery complete"
                    );
                    return Ok(());
                }
                Ok(_) => {
                    tracing::info!(
                        attempt,
                        retry_in = ?self.retry_timeout,
                        "discovery returned no resources yet"
                    );
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "bulk discovery attempt failed");
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(self.retry_timeout).await;
            }
        }
        Err(GatewayError::DiscoveryUnavailable {
            attempts: self.retries,
        })
    }

    /// Consume discovery events until the stream closes or shutdown fires.
    /// The pool lock is taken only inside each add/remove call.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<DiscoveryEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!("membership controller started");
        loop {
            tokio::select! {
                maybe = events.recv() => {
                    match maybe {
                        Some(event) => self.apply(event),
                        None => {
                            tracing::warn!("discovery event stream closed, membership controller exiting");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("membership controller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn apply(&self, event: DiscoveryEvent) {
        match event.action.as_str() {
            "start" => {
                let Some(uri) = event.uri.as_deref() else {
                    tracing::warn!(resource = %event.id, "start event without a resolved uri, discarding");
                    return;
                };
                match Url::parse(uri) {
                    Ok(url) => self.pool.add_resource(event.id, url),
                    Err(e) => {
                        tracing::warn!(
                            resource = %event.id,
                            uri = %uri,
                            error = %e,
                            "start event with unusable uri, discarding"
                        );
                    }
                }
            }
            "die" | "stop" => {
                self.pool.remove_resource(&event.id);
            }
            other => {
                tracing::warn!(
                    action = %other,
                    resource = %event.id,
                    "unrecognized discovery event, discarding"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::strategy;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Returns each scripted result in order, then repeats the last one.
    struct ScriptedDiscovery {
        calls: AtomicU32,
        script: Mutex<Vec<Result<HashMap<String, String>, GatewayError>>>,
    }

    impl ScriptedDiscovery {
        fn new(script: Vec<Result<HashMap<String, String>, GatewayError>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ResourceDiscovery for ScriptedDiscovery {
        async fn enumerate(&self) -> Result<HashMap<String, String>, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let mut script = self.script.lock().unwrap();
            let index = call.min(script.len() - 1);
            match &mut script[index] {
                Ok(map) => Ok(map.clone()),
                Err(_) => Err(GatewayError::Discovery("scripted failure".into())),
            }
        }
    }

    fn pool() -> Arc<PoolManager> {
        Arc::new(PoolManager::new(strategy::from_name("least").unwrap()))
    }

    fn one_backend() -> HashMap<String, String> {
        HashMap::from([("http://10.0.0.9:9091".to_string(), "c1".to_string())])
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_retries_until_nonempty() {
        let pool = pool();
        let controller =
            MembershipController::new(pool.clone(), 5, Duration::from_secs(3));
        // empty for the first 4 calls, resources on the 5th
        let source = ScriptedDiscovery::new(vec![
            Ok(HashMap::new()),
            Ok(HashMap::new()),
            Ok(HashMap::new()),
            Ok(HashMap::new()),
            Ok(one_backend()),
        ]);

        let started = Instant::now();
        controller.bootstrap(&source).await.unwrap();

        assert_eq!(source.calls(), 5);
        assert_eq!(pool.resource_count(), 1);
        // slept between attempts only: retries - 1 times
        assert_eq!(started.elapsed(), Duration::from_secs(3 * 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_exhaustion_is_fatal() {
        let controller = MembershipController::new(pool(), 3, Duration::from_secs(1));
        let source = ScriptedDiscovery::new(vec![Err(GatewayError::Discovery("down".into()))]);

        let err = controller.bootstrap(&source).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::DiscoveryUnavailable { attempts: 3 }
        ));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_event_loop_applies_and_survives_garbage() {
        let pool = pool();
        let controller = MembershipController::new(pool.clone(), 1, Duration::ZERO);
        let (tx, rx) = mpsc::channel(8);
        let (shutdown, _) = broadcast::channel(1);
        let task = tokio::spawn(controller.run(rx, shutdown.subscribe()));

        let start = |id: &str, uri: &str| DiscoveryEvent {
            action: "start".into(),
            id: id.into(),
            uri: Some(uri.into()),
        };
        tx.send(start("c1", "http://10.0.0.1:9091")).await.unwrap();
        tx.send(start("c2", "http://10.0.0.2:9091")).await.unwrap();
        // malformed and unknown events must not kill the loop
        tx.send(DiscoveryEvent {
            action: "start".into(),
            id: "c3".into(),
            uri: None,
        })
        .await
        .unwrap();
        tx.send(DiscoveryEvent {
            action: "pause".into(),
            id: "c1".into(),
            uri: None,
        })
        .await
        .unwrap();
        tx.send(DiscoveryEvent {
            action: "die".into(),
            id: "c1".into(),
            uri: None,
        })
        .await
        .unwrap();

        // closing the stream ends the loop
        drop(tx);
        task.await.unwrap();

        let snap = pool.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id, "c2");
    }

    #[tokio::test]
    async fn test_event_loop_stops_on_shutdown() {
        let controller = MembershipController::new(pool(), 1, Duration::ZERO);
        let (_tx, rx) = mpsc::channel::<DiscoveryEvent>(1);
        let (shutdown, _) = broadcast::channel(1);
        let task = tokio::spawn(controller.run(rx, shutdown.subscribe()));

        shutdown.send(()).unwrap();
        task.await.unwrap();
    }
}
