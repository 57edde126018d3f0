//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML config
//! files, and every field has a default so minimal configs work.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Routing core settings (strategy, route prefix).
    pub gateway: CoreConfig,

    /// Backend resources: static URIs and/or docker discovery.
    pub resources: ResourcesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address for the web interface and push API.
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9723".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Routing core settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Balancing strategy name: "least" or "random".
    pub strategy: String,

    /// Prefix for the internal routes of web endpoints.
    pub route_prefix: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            strategy: "least".to_string(),
            route_prefix: String::new(),
        }
    }
}

impl CoreConfig {
    /// Route prefix with "/" collapsed to empty and anything else reduced
    /// to a single leading slash.
    pub fn normalized_route_prefix(&self) -> String {
        let trimmed = self.route_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

/// Backend resource configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Static backend URIs, used when docker discovery is disabled.
    pub uris: Vec<String>,

    /// Docker discovery settings.
    pub docker: DockerConfig,
}

/// Docker discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Use the docker engine as the discovery source.
    pub enabled: bool,

    /// Engine API endpoint, e.g. "tcp://127.0.0.1:2375".
    pub endpoint: String,

    /// Label value selecting which containers belong to this gateway.
    pub label: String,

    /// Docker network the backend addresses are read from.
    pub network: String,

    /// Bulk-discovery attempts before startup fails.
    pub retries: u32,

    /// Seconds to sleep between bulk-discovery attempts.
    pub retry_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            label: "pushgateway".to_string(),
            network: "bridge".to_string(),
            retries: 5,
            retry_timeout_secs: 5,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address for the metrics endpoint.
    pub metrics_address: String,

    /// Emit logs as JSON instead of human-readable lines.
    pub log_json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9724".to_string(),
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_prefix_normalization() {
        let mut core = CoreConfig::default();
        assert_eq!(core.normalized_route_prefix(), "");

        core.route_prefix = "/".into();
        assert_eq!(core.normalized_route_prefix(), "");

        core.route_prefix = "push/".into();
        assert_eq!(core.normalized_route_prefix(), "/push");

        core.route_prefix = "//push/gw//".into();
        assert_eq!(core.normalized_route_prefix(), "/push/gw");
    }

    #[test]
    fn test_minimal_config_parses() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [resources]
            uris = ["http://127.0.0.1:9091"]
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.strategy, "least");
        assert_eq!(config.resources.uris.len(), 1);
        assert!(!config.resources.docker.enabled);
        assert_eq!(config.resources.docker.retries, 5);
    }
}
