//! Docker Engine discovery source.
//!
//! # Responsibilities
//! - Bulk-enumerate running containers carrying our resource label
//! - Stream container start/die events into the membership channel
//! - Resolve a container to `http://<network ip>:<published port>`
//!
//! Talks to the Engine REST API over HTTP; the endpoint must be reachable
//! as `http://` or `tcp://` (no unix socket support).

use std::collections::HashMap;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

use crate::discovery::{DiscoveryEvent, ResourceDiscovery};
use crate::error::GatewayError;

/// Label key marking a container as a push backend; the configured label
/// value selects which backends belong to this gateway.
pub const RESOURCE_LABEL_KEY: &str = "pushmux.resource";

#[derive(Debug, Clone)]
pub struct DockerDiscovery {
    http: reqwest::Client,
    endpoint: String,
    label: String,
    network: String,
}

impl DockerDiscovery {
    pub fn new(endpoint: &str, label: &str, network: &str) -> Self {
        let endpoint = endpoint
            .replacen("tcp://", "http://", 1)
            .trim_end_matches('/')
            .to_string();
        Self {
            http: reqwest::Client::new(),
            endpoint,
            label: label.to_string(),
            network: network.to_string(),
        }
    }

    fn has_label(&self, labels: &HashMap<String, String>) -> bool {
        labels.get(RESOURCE_LABEL_KEY) == Some(&self.label)
    }

    /// Resolve a container id to its target uri, for start events where the
    /// event payload carries no address.
    async fn resolve_uri(&self, id: &str) -> Result<String, GatewayError> {
        let url = format!("{}/containers/{}/json", self.endpoint, id);
        let inspect: ContainerInspect = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Discovery(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::Discovery(e.to_string()))?
            .json()
            .await
            .map_err(|e| GatewayError::Discovery(e.to_string()))?;

        let settings = inspect.network_settings;
        let ip = settings
            .networks
            .get(&self.network)
            .map(|n| n.ip_address.as_str())
            .unwrap_or_default();
        if ip.is_empty() {
            return Err(GatewayError::Discovery(format!(
                "container {id} has no address on network {}",
                self.network
            )));
        }
        let port = settings
            .ports
            .values()
            .flatten()
            .flatten()
            .find_map(|b| (!b.host_port.is_empty()).then(|| b.host_port.clone()))
            .ok_or_else(|| {
                GatewayError::Discovery(format!("container {id} publishes no port"))
            })?;
        Ok(format!("http://{ip}:{port}"))
    }

    /// Stream container start/die events into `tx` until the Engine drops
    /// the connection or shutdown fires. Unparseable payloads are skipped;
    /// a dead transport ends the listener.
    pub async fn run_event_listener(
        self,
        tx: mpsc::Sender<DiscoveryEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let filters = r#"{"type":["container"],"event":["start","die"]}"#;
        let url = format!("{}/events?filters={}", self.endpoint, filters);

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "failed to open docker event stream");
                return;
            }
        };
        tracing::info!(label = %self.label, "docker event listener started");

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        loop {
            tokio::select! {
                chunk = stream.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            buffer.extend_from_slice(&bytes);
                            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                                let line: Vec<u8> = buffer.drain(..=pos).collect();
                                self.handle_event_line(&line[..line.len() - 1], &tx).await;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "docker event stream failed");
                            break;
                        }
                        None => {
                            tracing::warn!("docker event stream ended");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("docker event listener received shutdown signal");
                    break;
                }
            }
        }
    }

    async fn handle_event_line(&self, line: &[u8], tx: &mpsc::Sender<DiscoveryEvent>) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        let message: EventMessage = match serde_json::from_slice(line) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable docker event, skipping");
                return;
            }
        };
        if !self.has_label(&message.actor.attributes) {
            return;
        }

        let uri = match message.action.as_str() {
            "start" => match self.resolve_uri(&message.actor.id).await {
                Ok(uri) => Some(uri),
                Err(e) => {
                    tracing::error!(
                        container = %message.actor.id,
                        error = %e,
                        "failed to resolve started container, skipping"
                    );
                    return;
                }
            },
            _ => None,
        };

        tracing::debug!(
            action = %message.action,
            container = %message.actor.id,
            uri = uri.as_deref().unwrap_or(""),
            "docker event"
        );
        let event = DiscoveryEvent {
            action: message.action,
            id: message.actor.id,
            uri,
        };
        if tx.send(event).await.is_err() {
            tracing::warn!("membership controller gone, dropping docker event");
        }
    }
}

impl ResourceDiscovery for DockerDiscovery {
    /// List running containers with our label and resolve each to a uri.
    /// A labelled container without an address yet is an error so the
    /// controller retries the whole enumeration.
    async fn enumerate(&self) -> Result<HashMap<String, String>, GatewayError> {
        let url = format!("{}/containers/json", self.endpoint);
        let containers: Vec<ContainerSummary> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Discovery(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::Discovery(e.to_string()))?
            .json()
            .await
            .map_err(|e| GatewayError::Discovery(e.to_string()))?;

        let mut uris = HashMap::new();
        for container in containers {
            if !self.has_label(&container.labels) {
                continue;
            }
            let ip = container
                .network_settings
                .as_ref()
                .and_then(|s| s.networks.get(&self.network))
                .map(|n| n.ip_address.as_str())
                .unwrap_or_default();
            if ip.is_empty() {
                return Err(GatewayError::Discovery(format!(
                    "container {} has no address on network {} yet",
                    container.id, self.network
                )));
            }
            let Some(port) = container
                .ports
                .iter()
                .find_map(|p| p.public_port.filter(|&p| p != 0))
            else {
                tracing::warn!(container = %container.id, "labelled container publishes no port, skipping");
                continue;
            };
            uris.insert(format!("http://{ip}:{port}"), container.id);
        }
        Ok(uris)
    }
}

// Engine API payloads, reduced to the fields we read.

#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Labels", default)]
    labels: HashMap<String, String>,
    #[serde(rename = "Ports", default)]
    ports: Vec<PortSummary>,
    #[serde(rename = "NetworkSettings")]
    network_settings: Option<SummaryNetworkSettings>,
}

#[derive(Debug, Deserialize)]
struct PortSummary {
    #[serde(rename = "PublicPort")]
    public_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SummaryNetworkSettings {
    #[serde(rename = "Networks", default)]
    networks: HashMap<String, NetworkEntry>,
}

#[derive(Debug, Deserialize)]
struct NetworkEntry {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

#[derive(Debug, Deserialize)]
struct ContainerInspect {
    #[serde(rename = "NetworkSettings")]
    network_settings: InspectNetworkSettings,
}

#[derive(Debug, Deserialize)]
struct InspectNetworkSettings {
    #[serde(rename = "Ports", default)]
    ports: HashMap<String, Option<Vec<PortBinding>>>,
    #[serde(rename = "Networks", default)]
    networks: HashMap<String, NetworkEntry>,
}

#[derive(Debug, Deserialize)]
struct PortBinding {
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

#[derive(Debug, Deserialize)]
struct EventMessage {
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Actor")]
    actor: EventActor,
}

#[derive(Debug, Deserialize)]
struct EventActor {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Attributes", default)]
    attributes: HashMap<String, String>,
}
